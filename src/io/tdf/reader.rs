use std::{
    io,
    iter::FusedIterator,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::calibration::ConvertableDomain;
use crate::io::{BatchPolicy, DetailLevel, TimsError};
use crate::spectrum::{AcquisitionType, DenseFrame, Frame, MSLevel, QuadrupoleSettings};

use super::blob::{decode_frame_blob, DecodedFrame, TdfBinReader};
use super::catalog::{FrameInfo, MetadataProvider, RunMetadata, TDFCatalog};
use super::constants::{TDF_BIN_FILE_NAME, TDF_FILE_NAME};

#[derive(Debug)]
struct OpenState {
    catalog: Arc<TDFCatalog>,
    bin_reader: TdfBinReader,
}

/// A builder for [`FrameReader`].
///
/// To create an instance, see [`FrameReader::build`]
#[derive(Debug, Default, Clone)]
pub struct FrameReaderBuilder {
    path: Option<PathBuf>,
    threads: Option<usize>,
    batch_policy: BatchPolicy,
    detail_level: DetailLevel,
}

impl FrameReaderBuilder {
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Decode batches on a dedicated pool of `threads` workers instead of rayon's
    /// global pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_batch_policy(mut self, batch_policy: BatchPolicy) -> Self {
        self.batch_policy = batch_policy;
        self
    }

    pub fn with_detail_level(mut self, detail_level: DetailLevel) -> Self {
        self.detail_level = detail_level;
        self
    }

    pub fn finalize(self) -> Result<FrameReader, TimsError> {
        let path = self.path.ok_or_else(|| {
            TimsError::IOError(io::Error::new(
                io::ErrorKind::InvalidInput,
                "No path was given to the frame reader builder",
            ))
        })?;
        let mut reader = FrameReader::new_with_detail_level(path, self.detail_level)?;
        reader.batch_policy = self.batch_policy;
        if let Some(threads) = self.threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| TimsError::IOError(io::Error::other(e)))?;
            reader.pool = Some(pool);
        }
        Ok(reader)
    }
}

/// Random access and batch reading of the frames of a timsTOF `.d` directory.
///
/// The catalog is loaded when the reader is created and stays read-only afterwards, so
/// a reader can be shared by reference across threads. Batch reads decode frames in
/// parallel and return them in the requested order. Once [`FrameReader::close`] is
/// called every read fails with [`TimsError::CatalogClosed`].
#[derive(Debug)]
pub struct FrameReader {
    path: PathBuf,
    state: RwLock<Option<Arc<OpenState>>>,
    pool: Option<rayon::ThreadPool>,
    batch_policy: BatchPolicy,
    pub detail_level: DetailLevel,
}

impl FrameReader {
    /// Open the `.d` directory at `path`.
    ///
    /// # Errors
    /// Any error raised by [`TDFCatalog::open`], or an IO error opening the frame store.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TimsError> {
        Self::new_with_detail_level(path, DetailLevel::Full)
    }

    pub fn new_with_detail_level<P: AsRef<Path>>(
        path: P,
        detail_level: DetailLevel,
    ) -> Result<Self, TimsError> {
        let path = path.as_ref();
        let catalog = TDFCatalog::open(path)?;
        let bin_reader = TdfBinReader::open(path.join(TDF_BIN_FILE_NAME))?;
        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(Some(Arc::new(OpenState {
                catalog: Arc::new(catalog),
                bin_reader,
            }))),
            pool: None,
            batch_policy: BatchPolicy::default(),
            detail_level,
        })
    }

    pub fn build() -> FrameReaderBuilder {
        FrameReaderBuilder::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        self.batch_policy
    }

    fn state(&self) -> Result<Arc<OpenState>, TimsError> {
        self.state.read().clone().ok_or(TimsError::CatalogClosed)
    }

    /// Release the catalog and the frame store handle. Reads in progress on other
    /// threads finish, later calls fail with [`TimsError::CatalogClosed`].
    pub fn close(&self) {
        if self.state.write().take().is_some() {
            log::debug!("Closed {}", self.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    /// The catalog this reader was opened with
    pub fn catalog(&self) -> Result<Arc<TDFCatalog>, TimsError> {
        Ok(self.state()?.catalog.clone())
    }

    pub fn metadata(&self) -> Result<RunMetadata, TimsError> {
        Ok(self.state()?.catalog.metadata().clone())
    }

    pub fn acquisition_type(&self) -> Result<AcquisitionType, TimsError> {
        Ok(self.state()?.catalog.acquisition_type())
    }

    /// The number of frames, `0` once closed
    pub fn len(&self) -> usize {
        self.state().map(|s| s.catalog.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frame_info(&self, index: usize) -> Result<FrameInfo, TimsError> {
        self.state()?
            .catalog
            .frame_info(index)
            .cloned()
            .ok_or(TimsError::IndexNotFound(index))
    }

    /// The isolation windows frame `index` was acquired with, empty outside DIA window groups
    pub fn quadrupole_settings(&self, index: usize) -> Result<Arc<QuadrupoleSettings>, TimsError> {
        let state = self.state()?;
        if state.catalog.frame_info(index).is_none() {
            return Err(TimsError::IndexNotFound(index));
        }
        Ok(state.catalog.quadrupole_settings_for_frame(index))
    }

    fn decode(&self, state: &OpenState, info: &FrameInfo) -> Result<Frame, TimsError> {
        let decoded = match self.detail_level {
            DetailLevel::MetadataOnly => DecodedFrame {
                scan_offsets: vec![0; info.scan_count],
                ..Default::default()
            },
            DetailLevel::Full => {
                let record = state
                    .bin_reader
                    .read_record(info.byte_offset, info.byte_length)
                    .and_then(|record| decode_frame_blob(&record, info.scan_count))
                    .inspect_err(|e| {
                        log::error!("Failed to read frame {}: {e}", info.index);
                    })?;
                if record.tof_indices.len() != info.peak_count {
                    log::warn!(
                        "Frame {} decoded {} peaks but the catalog lists {}",
                        info.index,
                        record.tof_indices.len(),
                        info.peak_count
                    );
                }
                record
            }
        };
        Ok(Frame {
            index: info.index,
            rt: info.rt,
            ms_level: info.ms_level,
            acquisition_type: info.acquisition_type,
            scan_offsets: decoded.scan_offsets,
            tof_indices: decoded.tof_indices,
            intensities: decoded.intensities,
            window_group: info.window_group,
            quadrupole_settings: state.catalog.quadrupole_settings_for_frame(info.index),
            intensity_correction_factor: info.intensity_correction_factor(),
        })
    }

    /// Read and decode a single frame by its 1-based index.
    ///
    /// # Errors
    /// [`TimsError::IndexNotFound`] for an unknown index, or a decoding error.
    pub fn read_frame(&self, index: usize) -> Result<Frame, TimsError> {
        let state = self.state()?;
        let info = state
            .catalog
            .frame_info(index)
            .ok_or(TimsError::IndexNotFound(index))?;
        self.decode(&state, info)
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn decode_all(&self, state: &OpenState, infos: &[&FrameInfo]) -> Result<Vec<Frame>, TimsError> {
        match self.batch_policy {
            BatchPolicy::FailFast => self.install(|| {
                infos
                    .par_iter()
                    .map(|info| self.decode(state, info))
                    .collect()
            }),
            BatchPolicy::CollectPartial => {
                let results: Vec<Result<Frame, TimsError>> = self.install(|| {
                    infos
                        .par_iter()
                        .map(|info| self.decode(state, info))
                        .collect()
                });
                Ok(results.into_iter().filter_map(Result::ok).collect())
            }
        }
    }

    /// Read the frames at `indices`, in the order given.
    ///
    /// Under [`BatchPolicy::FailFast`] the first failure aborts the batch. Under
    /// [`BatchPolicy::CollectPartial`] frames that fail to decode are logged and left out,
    /// use [`FrameReader::read_frames_partial`] to see each failure.
    pub fn read_frames(&self, indices: &[usize]) -> Result<Vec<Frame>, TimsError> {
        let state = self.state()?;
        let infos = indices
            .iter()
            .map(|i| {
                state
                    .catalog
                    .frame_info(*i)
                    .ok_or(TimsError::IndexNotFound(*i))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.decode_all(&state, &infos)
    }

    /// Read the frames at `indices` in the order given, with one result per index
    pub fn read_frames_partial(&self, indices: &[usize]) -> Vec<Result<Frame, TimsError>> {
        let state = match self.state() {
            Ok(state) => state,
            Err(_) => {
                return indices
                    .iter()
                    .map(|_| Err(TimsError::CatalogClosed))
                    .collect()
            }
        };
        self.install(|| {
            indices
                .par_iter()
                .map(|i| {
                    let info = state
                        .catalog
                        .frame_info(*i)
                        .ok_or(TimsError::IndexNotFound(*i))?;
                    self.decode(&state, info)
                })
                .collect()
        })
    }

    /// Decode every frame whose catalog entry satisfies `predicate`, in ascending index
    /// order. Excluded frames are never read.
    pub fn filter<F: Fn(&FrameInfo) -> bool + Sync>(
        &self,
        predicate: F,
    ) -> Result<Vec<Frame>, TimsError> {
        let state = self.state()?;
        let infos: Vec<&FrameInfo> = state
            .catalog
            .frames()
            .iter()
            .filter(|info| predicate(info))
            .collect();
        self.decode_all(&state, &infos)
    }

    pub fn read_all_frames(&self) -> Result<Vec<Frame>, TimsError> {
        self.filter(|_| true)
    }

    pub fn read_ms1_frames(&self) -> Result<Vec<Frame>, TimsError> {
        self.filter(|info| info.ms_level == MSLevel::MS1)
    }

    /// MS2 frames of a DIA-PASEF run, diagonal or not, empty for any other acquisition type
    pub fn read_dia_frames(&self) -> Result<Vec<Frame>, TimsError> {
        self.filter(|info| info.is_dia())
    }

    /// Iterate over all frames in ascending index order
    pub fn iter(&self) -> FrameIter<'_> {
        FrameIter::new(self)
    }

    pub fn resolve_mzs(&self, tof_indices: &[u32]) -> Result<Vec<f64>, TimsError> {
        Ok(self
            .state()?
            .catalog
            .calibration_model()
            .resolve_mzs(tof_indices)?)
    }

    pub fn resolve_scans(&self, scan_numbers: &[u32]) -> Result<Vec<f64>, TimsError> {
        Ok(self
            .state()?
            .catalog
            .calibration_model()
            .resolve_scans(scan_numbers)?)
    }

    pub fn resolve_frames(&self, frame_numbers: &[u32]) -> Result<Vec<f64>, TimsError> {
        Ok(self
            .state()?
            .catalog
            .calibration_model()
            .resolve_frames(frame_numbers)?)
    }

    pub fn invert_mzs(&self, mzs: &[f64]) -> Result<Vec<f64>, TimsError> {
        Ok(self.state()?.catalog.calibration_model().invert_mzs(mzs))
    }

    pub fn invert_scans(&self, ion_mobilities: &[f64]) -> Result<Vec<f64>, TimsError> {
        Ok(self
            .state()?
            .catalog
            .calibration_model()
            .invert_scans(ion_mobilities))
    }

    pub fn invert_frames(&self, retention_times: &[f64]) -> Result<Vec<f64>, TimsError> {
        Ok(self
            .state()?
            .catalog
            .calibration_model()
            .invert_frames(retention_times))
    }

    /// Calibrate every peak of `frame`, pairing it with the ion mobility of its scan
    pub fn flatten(&self, frame: &Frame) -> Result<DenseFrame, TimsError> {
        let state = self.state()?;
        let calibration = state.catalog.calibration_model();
        let mz_values = calibration.resolve_mzs(&frame.tof_indices)?;
        let mut ion_mobilities = Vec::with_capacity(frame.peak_count());
        for (scan, _) in frame.iter_scan_positions() {
            ion_mobilities.push(calibration.im_converter.convert_checked(scan as f64)?);
        }
        Ok(DenseFrame {
            index: frame.index,
            rt: frame.rt,
            mz_values,
            ion_mobilities,
            intensities: frame.intensities.clone(),
        })
    }
}

/// Test whether `path` looks like a timsTOF `.d` directory, one holding both the
/// catalog and the frame store
pub fn is_tdf<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();

    if !path.extension().map(|e| e == "d").unwrap_or_default() {
        return false;
    }

    if !path.is_dir() {
        return false;
    }

    path.join(TDF_FILE_NAME).is_file() && path.join(TDF_BIN_FILE_NAME).is_file()
}

impl<'a> IntoIterator for &'a FrameReader {
    type Item = Result<Frame, TimsError>;
    type IntoIter = FrameIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A lazy pass over the frames of a [`FrameReader`] in ascending index order. Each
/// frame is decoded when it is reached. [`FrameIter::reset`] starts a fresh pass.
#[derive(Debug)]
pub struct FrameIter<'a> {
    reader: &'a FrameReader,
    indices: Vec<usize>,
    position: usize,
}

impl<'a> FrameIter<'a> {
    fn new(reader: &'a FrameReader) -> Self {
        let indices = reader
            .state()
            .map(|s| s.catalog.all_frame_indices())
            .unwrap_or_default();
        Self {
            reader,
            indices,
            position: 0,
        }
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame, TimsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.indices.get(self.position)?;
        self.position += 1;
        Some(self.reader.read_frame(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len() - self.position;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.position = self.position.saturating_add(n).min(self.indices.len());
        self.next()
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

impl FusedIterator for FrameIter<'_> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::tdf::fixtures::TdfFixture;
    use crate::io::tdf::FrameDecodeError;

    fn assert_frame_invariants(frame: &Frame, info: &FrameInfo) {
        assert_eq!(frame.scan_offsets.len(), info.scan_count);
        assert_eq!(
            frame.scan_offsets.last().copied().unwrap_or_default(),
            frame.tof_indices.len()
        );
        assert_eq!(frame.tof_indices.len(), frame.intensities.len());
        assert!(frame.scan_offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test_log::test]
    fn test_read_frame() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        assert_eq!(reader.len(), 5);

        let frame = reader.read_frame(2)?;
        assert_eq!(frame.index, 2);
        assert_eq!(frame.rt, 0.2);
        assert_eq!(frame.ms_level, MSLevel::MS2);
        assert_eq!(frame.acquisition_type, AcquisitionType::DIAPASEF);
        assert_eq!(frame.window_group, Some(1));
        assert_eq!(frame.intensity_correction_factor, 0.01);
        assert_frame_invariants(&frame, &reader.frame_info(2)?);

        let expected: Vec<(u32, u32)> = fixture.frames[1].scans.iter().flatten().copied().collect();
        let observed: Vec<(u32, u32)> = frame
            .tof_indices
            .iter()
            .copied()
            .zip(frame.intensities.iter().copied())
            .collect();
        assert_eq!(observed, expected);

        assert!(matches!(
            reader.read_frame(0),
            Err(TimsError::IndexNotFound(0))
        ));
        assert!(matches!(
            reader.read_frame(6),
            Err(TimsError::IndexNotFound(6))
        ));
        Ok(())
    }

    #[test]
    fn test_all_frames_invariants() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        let frames = reader.read_all_frames()?;
        let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        for frame in frames.iter() {
            assert_frame_invariants(frame, &reader.frame_info(frame.index)?);
        }
        Ok(())
    }

    #[test]
    fn test_filters_partition_dia_run() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        let ms1 = reader.read_ms1_frames()?;
        let dia = reader.read_dia_frames()?;
        assert!(ms1.iter().all(|f| f.ms_level == MSLevel::MS1));
        assert!(dia
            .iter()
            .all(|f| f.acquisition_type == AcquisitionType::DIAPASEF
                && f.ms_level == MSLevel::MS2));

        let mut covered: Vec<usize> = ms1.iter().chain(dia.iter()).map(|f| f.index).collect();
        covered.sort();
        assert_eq!(covered, vec![1, 2, 3, 4, 5]);
        assert_eq!(ms1.len() + dia.len(), reader.len());
        Ok(())
    }

    #[test]
    fn test_frames_carry_quadrupole_settings() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        let frames = reader.read_frames(&[2, 5, 1])?;
        assert!(Arc::ptr_eq(
            &frames[0].quadrupole_settings,
            &frames[1].quadrupole_settings
        ));
        let settings = &frames[0].quadrupole_settings;
        assert_eq!(settings.index, 1);
        assert_eq!(settings.isolation_mz, vec![500.0, 525.0]);
        assert_eq!(settings.collision_energy, vec![30.0, 32.0]);
        assert!(frames[2].quadrupole_settings.is_empty());

        assert_eq!(reader.quadrupole_settings(3)?.isolation_mz, vec![550.0, 575.0]);
        assert!(reader.quadrupole_settings(4)?.is_empty());
        assert!(matches!(
            reader.quadrupole_settings(9),
            Err(TimsError::IndexNotFound(9))
        ));
        Ok(())
    }

    #[test]
    fn test_dda_run_has_no_dia_frames() -> Result<(), TimsError> {
        let fixture = TdfFixture::dda_run()?;
        let reader = FrameReader::new(fixture.path())?;
        assert!(reader.read_dia_frames()?.is_empty());
        assert_eq!(reader.read_ms1_frames()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_batch_order_and_threads() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::build()
            .with_path(fixture.path())
            .with_threads(2)
            .finalize()?;
        let frames = reader.read_frames(&[4, 1, 5, 2])?;
        let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![4, 1, 5, 2]);
        for frame in frames {
            assert_eq!(frame, reader.read_frame(frame.index)?);
        }
        assert!(matches!(
            reader.read_frames(&[1, 9]),
            Err(TimsError::IndexNotFound(9))
        ));
        Ok(())
    }

    #[test]
    fn test_iteration_restarts() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        let mut it = reader.iter();
        assert_eq!(it.len(), 5);
        let first_pass: Vec<Frame> = it.by_ref().collect::<Result<_, _>>()?;
        assert!(it.next().is_none());
        it.reset();
        let second_pass: Vec<Frame> = it.collect::<Result<_, _>>()?;
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass, reader.read_all_frames()?);

        let mut n = 0;
        for frame in &reader {
            n += 1;
            assert_eq!(frame?.index, n);
        }
        assert_eq!(n, 5);
        Ok(())
    }

    #[test]
    fn test_close() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        assert!(reader.is_open());
        reader.close();
        assert!(!reader.is_open());
        assert!(matches!(reader.read_frame(1), Err(TimsError::CatalogClosed)));
        assert!(matches!(reader.read_all_frames(), Err(TimsError::CatalogClosed)));
        assert!(matches!(reader.resolve_mzs(&[1]), Err(TimsError::CatalogClosed)));
        assert!(reader.is_empty());
        assert_eq!(reader.iter().count(), 0);
        reader.close();
        Ok(())
    }

    #[test]
    fn test_truncated_store() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let length = fixture.bin_length()?;
        let handle = std::fs::OpenOptions::new()
            .write(true)
            .open(fixture.bin_path())?;
        handle.set_len(length - 4)?;
        drop(handle);

        let reader = FrameReader::new(fixture.path())?;
        assert!(reader.read_frame(1).is_ok());
        assert!(matches!(
            reader.read_frame(5),
            Err(TimsError::FrameDecode(FrameDecodeError::TruncatedFrame { .. }))
        ));
        assert!(reader.read_all_frames().is_err());

        let partial = reader.read_frames_partial(&[1, 5, 7]);
        assert!(partial[0].is_ok());
        assert!(partial[1].is_err());
        assert!(matches!(partial[2], Err(TimsError::IndexNotFound(7))));

        let reader = FrameReader::build()
            .with_path(fixture.path())
            .with_batch_policy(BatchPolicy::CollectPartial)
            .finalize()?;
        assert_eq!(reader.read_all_frames()?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_is_tdf() -> Result<(), TimsError> {
        let fixture = TdfFixture::dda_run()?;
        assert!(is_tdf(fixture.path()));
        assert!(!is_tdf(fixture.tdf_path()));
        assert!(!is_tdf(fixture.path().join("missing.d")));
        std::fs::remove_file(fixture.bin_path())?;
        assert!(!is_tdf(fixture.path()));
        Ok(())
    }

    #[test]
    fn test_metadata_only() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new_with_detail_level(fixture.path(), DetailLevel::MetadataOnly)?;
        let frame = reader.read_frame(3)?;
        assert!(frame.is_empty());
        assert_eq!(frame.scan_offsets, vec![0; 10]);
        assert_eq!(frame.rt, 0.3);
        Ok(())
    }

    #[test]
    fn test_resolve_and_reopen() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let tofs: Vec<u32> = vec![0, 1000, 399_999, 50];
        let scans: Vec<u32> = vec![0, 3, 9];

        let reader = FrameReader::new(fixture.path())?;
        let mzs = reader.resolve_mzs(&tofs)?;
        let ims = reader.resolve_scans(&scans)?;
        assert_eq!(mzs.len(), tofs.len());
        assert_eq!(ims.len(), scans.len());
        assert_eq!(mzs, reader.resolve_mzs(&tofs)?);
        assert!(ims.windows(2).all(|w| w[0] > w[1]));
        assert!(matches!(
            reader.resolve_mzs(&[400_001]),
            Err(TimsError::Calibration(_))
        ));
        assert_eq!(reader.resolve_frames(&[1, 5])?, vec![0.1, 0.5]);
        drop(reader);

        let reader = FrameReader::new(fixture.path())?;
        let again = reader.resolve_mzs(&tofs)?;
        assert!(mzs.iter().zip(again.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        let again = reader.resolve_scans(&scans)?;
        assert!(ims.iter().zip(again.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));

        let back = reader.invert_mzs(&mzs)?;
        assert!((back[1] - 1000.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_flatten() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let reader = FrameReader::new(fixture.path())?;
        let frame = reader.read_frame(1)?;
        let dense = reader.flatten(&frame)?;
        assert_eq!(dense.len(), frame.peak_count());
        assert_eq!(dense.ion_mobilities.len(), dense.mz_values.len());
        assert_eq!(dense.mz_values, reader.resolve_mzs(&frame.tof_indices)?);
        assert!(dense.ion_mobilities.windows(2).all(|w| w[0] >= w[1]));
        Ok(())
    }
}
