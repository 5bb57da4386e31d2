//! The metadata catalog of a timsTOF run, `analysis.tdf`.
//!
//! Everything the readers need from the catalog is loaded once when it is opened and
//! converted into typed, immutable records. The SQL connection is released as soon as
//! loading finishes, so a [`TDFCatalog`] can be shared across threads without locking.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, FixedOffset};
use identity_hash::BuildIdentityHasher;

use crate::calibration::{
    CalibrationModel, ConvertableDomain, Frame2RtConverter, Scan2ImConverter, Tof2MzConverter,
};
use crate::io::TimsError;
use crate::spectrum::{AcquisitionType, MSLevel, QuadrupoleSettings};

use super::constants::{MsMsType, SUPPORTED_COMPRESSION_TYPE, TDF_BIN_FILE_NAME, TDF_FILE_NAME};
use super::sql::{
    FromSQL, RawTDFSQLReader, SQLDIAFrameMsMsInfo, SQLDIAFrameMsMsWindow, SQLFrame,
    SQLPasefFrameMsMs, SQLPrecursor,
};

pub type DiaFrameGroupMap = HashMap<usize, u32, BuildIdentityHasher<usize>>;
pub type DiaWindowGroupMap = HashMap<u32, Vec<DiaWindow>, BuildIdentityHasher<u32>>;
pub type QuadrupoleSettingsMap =
    HashMap<u32, Arc<QuadrupoleSettings>, BuildIdentityHasher<u32>>;
type FramePositionMap = HashMap<usize, usize, BuildIdentityHasher<usize>>;

/// The catalog's description of one frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameInfo {
    pub index: usize,
    pub rt: f64,
    pub msms_type: u8,
    pub ms_level: MSLevel,
    pub acquisition_type: AcquisitionType,
    pub scan_count: usize,
    pub peak_count: usize,
    pub byte_offset: u64,
    pub byte_length: u64,
    pub window_group: Option<u32>,
    pub accumulation_time: f64,
}

impl FrameInfo {
    pub fn msms_type(&self) -> MsMsType {
        MsMsType::from(self.msms_type)
    }

    pub fn intensity_correction_factor(&self) -> f64 {
        if self.accumulation_time > 0.0 {
            1.0 / self.accumulation_time
        } else {
            1.0
        }
    }

    pub fn is_dia(&self) -> bool {
        self.acquisition_type.is_dia() && self.ms_level == MSLevel::MS2
    }
}

/// One isolation window of a DIA window group
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiaWindow {
    pub window_group: u32,
    pub scan_begin: usize,
    pub scan_end: usize,
    pub isolation_mz: f64,
    pub isolation_width: f64,
    pub collision_energy: f64,
}

fn quadrupole_settings_for(window_group: u32, windows: &[DiaWindow]) -> QuadrupoleSettings {
    QuadrupoleSettings {
        index: window_group as usize,
        scan_starts: windows.iter().map(|w| w.scan_begin).collect(),
        scan_ends: windows.iter().map(|w| w.scan_end).collect(),
        isolation_mz: windows.iter().map(|w| w.isolation_mz).collect(),
        isolation_width: windows.iter().map(|w| w.isolation_width).collect(),
        collision_energy: windows.iter().map(|w| w.collision_energy).collect(),
    }
}

impl From<SQLDIAFrameMsMsWindow> for DiaWindow {
    fn from(value: SQLDIAFrameMsMsWindow) -> Self {
        Self {
            window_group: value.window_group,
            scan_begin: value.scan_start,
            scan_end: value.scan_end,
            isolation_mz: value.isolation_mz,
            isolation_width: value.isolation_width,
            collision_energy: value.collision_energy,
        }
    }
}

/// A DDA precursor ion as recorded in the `Precursors` table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorRecord {
    pub id: usize,
    pub largest_peak_mz: Option<f64>,
    pub monoisotopic_mz: Option<f64>,
    pub charge: Option<usize>,
    pub scan_number: f64,
    pub intensity: Option<f64>,
    pub parent: usize,
}

impl PrecursorRecord {
    /// Whether either m/z column holds a value
    pub fn has_mz(&self) -> bool {
        self.monoisotopic_mz.is_some() || self.largest_peak_mz.is_some()
    }

    /// The monoisotopic m/z when it was determined, otherwise the most intense peak's.
    ///
    /// A record with neither reports `0.0`; the catalog warns about such records when it
    /// is opened.
    pub fn mz(&self) -> f64 {
        self.monoisotopic_mz
            .or(self.largest_peak_mz)
            .unwrap_or_default()
    }
}

impl From<SQLPrecursor> for PrecursorRecord {
    fn from(value: SQLPrecursor) -> Self {
        Self {
            id: value.id,
            largest_peak_mz: value.largest_peak_mz,
            monoisotopic_mz: value.monoisotopic_mz,
            charge: value
                .charge
                .and_then(|z| usize::try_from(z).ok())
                .filter(|z| *z > 0),
            scan_number: value.scan_number,
            intensity: value.intensity,
            parent: value.parent,
        }
    }
}

/// One PASEF fragmentation event, linking a scan range of an MS2 frame to a precursor
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PasefWindow {
    pub frame: usize,
    pub scan_begin: usize,
    pub scan_end: usize,
    pub isolation_mz: f64,
    pub isolation_width: f64,
    pub collision_energy: f64,
    pub precursor: usize,
}

impl From<SQLPasefFrameMsMs> for PasefWindow {
    fn from(value: SQLPasefFrameMsMs) -> Self {
        Self {
            frame: value.frame,
            scan_begin: value.scan_start,
            scan_end: value.scan_end,
            isolation_mz: value.isolation_mz,
            isolation_width: value.isolation_width,
            collision_energy: value.collision_energy,
            precursor: value.precursor,
        }
    }
}

/// Run-level facts read from `GlobalMetadata` and the frame table
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunMetadata {
    pub path: PathBuf,
    pub compression_type: u8,
    pub mz_range: (f64, f64),
    pub im_range: (f64, f64),
    pub rt_range: (f64, f64),
    pub digitizer_samples: u32,
    pub max_scan_count: usize,
    pub acquisition_software: Option<String>,
    pub instrument_name: Option<String>,
    pub instrument_serial_number: Option<String>,
    pub sample_name: Option<String>,
    pub acquisition_date_time: Option<DateTime<FixedOffset>>,
}

fn required_value<T: std::str::FromStr>(
    metadata: &HashMap<String, String>,
    key: &str,
) -> Result<T, TimsError> {
    let value = metadata
        .get(key)
        .ok_or_else(|| TimsError::SchemaMismatch(format!("GlobalMetadata lacks {key}")))?;
    value.trim().parse().map_err(|_| {
        TimsError::SchemaMismatch(format!("GlobalMetadata {key} has an invalid value {value:?}"))
    })
}

impl RunMetadata {
    fn from_global_metadata(
        path: PathBuf,
        metadata: &HashMap<String, String>,
    ) -> Result<Self, TimsError> {
        let compression_type: u8 = required_value(metadata, "TimsCompressionType")?;
        if compression_type != SUPPORTED_COMPRESSION_TYPE {
            return Err(TimsError::SchemaMismatch(format!(
                "Unsupported TimsCompressionType {compression_type}"
            )));
        }
        let optional = |key: &str| metadata.get(key).filter(|v| !v.is_empty()).cloned();
        let acquisition_date_time = metadata.get("AcquisitionDateTime").and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .inspect_err(|e| log::warn!("Failed to parse AcquisitionDateTime {s:?}: {e}"))
                .ok()
        });
        Ok(Self {
            path,
            compression_type,
            mz_range: (
                required_value(metadata, "MzAcqRangeLower")?,
                required_value(metadata, "MzAcqRangeUpper")?,
            ),
            im_range: (
                required_value(metadata, "OneOverK0AcqRangeLower")?,
                required_value(metadata, "OneOverK0AcqRangeUpper")?,
            ),
            digitizer_samples: required_value(metadata, "DigitizerNumSamples")?,
            acquisition_software: optional("AcquisitionSoftware"),
            instrument_name: optional("InstrumentName"),
            instrument_serial_number: optional("InstrumentSerialNumber"),
            sample_name: optional("SampleName"),
            acquisition_date_time,
            ..Default::default()
        })
    }
}

/// The lookups the frame and spectrum readers need from a run's catalog. Any store
/// that can answer them can back a reader.
pub trait MetadataProvider {
    fn calibration_model(&self) -> &CalibrationModel;

    fn frame_info(&self, index: usize) -> Option<&FrameInfo>;

    /// All frame indices in ascending order
    fn all_frame_indices(&self) -> Vec<usize>;

    fn dia_frame_to_group(&self) -> &DiaFrameGroupMap;

    fn dia_group_to_windows(&self) -> &DiaWindowGroupMap;

    fn acquisition_type(&self) -> AcquisitionType;
}

/// The typed, in-memory contents of `analysis.tdf`
#[derive(Debug, Clone, Default)]
pub struct TDFCatalog {
    metadata: RunMetadata,
    calibration: CalibrationModel,
    acquisition_type: AcquisitionType,
    frames: Vec<FrameInfo>,
    positions: FramePositionMap,
    dia_frame_groups: DiaFrameGroupMap,
    dia_windows: DiaWindowGroupMap,
    quadrupole_settings: QuadrupoleSettingsMap,
    precursors: Vec<PrecursorRecord>,
    pasef_windows: Vec<PasefWindow>,
}

fn sql_error_for(table: &'static str) -> impl Fn(rusqlite::Error) -> TimsError {
    move |e| match e {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            TimsError::CorruptCatalog(format!("Invalid value in {table}: {e}"))
        }
        e => TimsError::SQLError(e),
    }
}

fn check_table<T: FromSQL>(reader: &RawTDFSQLReader, required: bool) -> Result<bool, TimsError> {
    if !reader.has_table(T::TABLE)? {
        if required {
            return Err(TimsError::SchemaMismatch(format!(
                "Missing table {}",
                T::TABLE
            )));
        }
        return Ok(false);
    }
    let missing = reader.missing_columns::<T>()?;
    if !missing.is_empty() {
        return Err(TimsError::SchemaMismatch(format!(
            "Table {} lacks columns {}",
            T::TABLE,
            missing.join(", ")
        )));
    }
    Ok(true)
}

fn read_optional<T: FromSQL>(reader: &RawTDFSQLReader) -> Result<Vec<T>, TimsError> {
    if check_table::<T>(reader, false)? {
        reader.read_all().map_err(sql_error_for(T::TABLE))
    } else {
        Ok(Vec::new())
    }
}

impl TDFCatalog {
    /// Open the catalog of the `.d` directory at `path`.
    ///
    /// # Errors
    /// - [`TimsError::NotFound`] if the directory or either of its component files is missing
    /// - [`TimsError::SchemaMismatch`] if a required table, column or metadata key is missing
    /// - [`TimsError::CorruptCatalog`] if values cannot be converted or references dangle
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TimsError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(TimsError::NotFound(path.to_path_buf()));
        }
        let tdf_path = path.join(TDF_FILE_NAME);
        if !tdf_path.is_file() {
            return Err(TimsError::NotFound(tdf_path));
        }
        let bin_path = path.join(TDF_BIN_FILE_NAME);
        let bin_length = match std::fs::metadata(&bin_path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(TimsError::NotFound(bin_path)),
        };

        let reader = RawTDFSQLReader::new(&tdf_path)?;
        let this = Self::load(&reader, path.to_path_buf(), bin_length)?;
        log::debug!(
            "Opened {} with {} frames, acquisition type {}",
            path.display(),
            this.frames.len(),
            this.acquisition_type
        );
        Ok(this)
    }

    fn load(reader: &RawTDFSQLReader, path: PathBuf, bin_length: u64) -> Result<Self, TimsError> {
        check_table::<super::sql::KeyValue>(reader, true)?;
        check_table::<SQLFrame>(reader, true)?;

        let global = reader.metadata().map_err(sql_error_for("GlobalMetadata"))?;
        let mut metadata = RunMetadata::from_global_metadata(path, &global)?;

        let q = format!("{} ORDER BY Id", SQLFrame::get_sql());
        let sql_frames: Vec<SQLFrame> = reader.query(&q, []).map_err(sql_error_for("Frames"))?;

        let mut acquisition_type =
            AcquisitionType::from_msms_types(sql_frames.iter().map(|f| f.msms_type));

        let dia_infos: Vec<SQLDIAFrameMsMsInfo> = read_optional(reader)?;
        let dia_window_rows: Vec<SQLDIAFrameMsMsWindow> = read_optional(reader)?;
        let precursor_rows: Vec<SQLPrecursor> = read_optional(reader)?;
        let pasef_rows: Vec<SQLPasefFrameMsMs> = read_optional(reader)?;

        let mut positions = FramePositionMap::default();
        for (i, frame) in sql_frames.iter().enumerate() {
            if positions.insert(frame.id, i).is_some() {
                return Err(TimsError::CorruptCatalog(format!(
                    "Frame id {} appears more than once",
                    frame.id
                )));
            }
        }

        let byte_lengths = Self::derive_byte_lengths(&sql_frames, bin_length)?;

        let mut dia_windows = DiaWindowGroupMap::default();
        for window in dia_window_rows {
            dia_windows
                .entry(window.window_group)
                .or_default()
                .push(window.into());
        }
        let quadrupole_settings: QuadrupoleSettingsMap = dia_windows
            .iter()
            .map(|(group, windows)| {
                (*group, Arc::new(quadrupole_settings_for(*group, windows)))
            })
            .collect();
        if acquisition_type == AcquisitionType::DIAPASEF
            && quadrupole_settings
                .values()
                .any(|settings| settings.has_overlapping_windows())
        {
            acquisition_type = AcquisitionType::DiagonalDIAPASEF;
        }

        let mut dia_frame_groups = DiaFrameGroupMap::default();
        for info in dia_infos {
            if !positions.contains_key(&info.frame) {
                return Err(TimsError::CorruptCatalog(format!(
                    "DiaFrameMsMsInfo references missing frame {}",
                    info.frame
                )));
            }
            if !dia_windows.contains_key(&info.window_group) {
                return Err(TimsError::CorruptCatalog(format!(
                    "Frame {} references window group {} which has no windows",
                    info.frame, info.window_group
                )));
            }
            dia_frame_groups.insert(info.frame, info.window_group);
        }

        let mut precursors: Vec<PrecursorRecord> =
            precursor_rows.into_iter().map(PrecursorRecord::from).collect();
        precursors.sort_by_key(|p| p.id);
        for precursor in precursors.iter() {
            if !positions.contains_key(&precursor.parent) {
                return Err(TimsError::CorruptCatalog(format!(
                    "Precursor {} references missing parent frame {}",
                    precursor.id, precursor.parent
                )));
            }
            if !precursor.has_mz() {
                log::warn!(
                    "Precursor {} has neither a monoisotopic nor a largest peak m/z",
                    precursor.id
                );
            }
        }
        let pasef_windows: Vec<PasefWindow> = pasef_rows.into_iter().map(PasefWindow::from).collect();
        for pasef in pasef_windows.iter() {
            if !positions.contains_key(&pasef.frame) {
                return Err(TimsError::CorruptCatalog(format!(
                    "PasefFrameMsMsInfo references missing frame {}",
                    pasef.frame
                )));
            }
            if precursors
                .binary_search_by_key(&pasef.precursor, |p| p.id)
                .is_err()
            {
                return Err(TimsError::CorruptCatalog(format!(
                    "PasefFrameMsMsInfo references missing precursor {}",
                    pasef.precursor
                )));
            }
        }

        let max_scan_count = sql_frames.iter().map(|f| f.num_scans).max().unwrap_or_default();
        metadata.max_scan_count = max_scan_count;
        metadata.rt_range = (
            sql_frames.first().map(|f| f.time).unwrap_or_default(),
            sql_frames.last().map(|f| f.time).unwrap_or_default(),
        );

        let calibration = CalibrationModel::new(
            Tof2MzConverter::new(
                metadata.mz_range.0,
                metadata.mz_range.1,
                metadata.digitizer_samples,
            ),
            Scan2ImConverter::new(
                metadata.im_range.0,
                metadata.im_range.1,
                u32::try_from(max_scan_count).map_err(|_| {
                    TimsError::CorruptCatalog(format!(
                        "NumScans {max_scan_count} is out of range"
                    ))
                })?,
            ),
            Frame2RtConverter::from_values(sql_frames.iter().map(|f| f.time).collect()),
        );

        let frames: Vec<FrameInfo> = sql_frames
            .iter()
            .zip(byte_lengths)
            .map(|(frame, byte_length)| {
                if frame.num_peaks == 0 {
                    log::debug!("Frame {} has no peaks", frame.id);
                }
                FrameInfo {
                    index: frame.id,
                    rt: frame.time,
                    msms_type: frame.msms_type,
                    ms_level: MSLevel::from_msms_type(frame.msms_type),
                    acquisition_type,
                    scan_count: frame.num_scans,
                    peak_count: frame.num_peaks,
                    byte_offset: frame.tims_id,
                    byte_length,
                    window_group: dia_frame_groups.get(&frame.id).copied(),
                    accumulation_time: frame.accumulation_time,
                }
            })
            .collect();

        for frame in frames.iter() {
            if frame.msms_type() == MsMsType::DIAPASEF && frame.window_group.is_none() {
                log::warn!("DIA frame {} has no window group", frame.index);
            }
        }

        Ok(Self {
            metadata,
            calibration,
            acquisition_type,
            frames,
            positions,
            dia_frame_groups,
            dia_windows,
            quadrupole_settings,
            precursors,
            pasef_windows,
        })
    }

    /// A record runs up to the next record's offset, or the end of the frame store
    fn derive_byte_lengths(frames: &[SQLFrame], bin_length: u64) -> Result<Vec<u64>, TimsError> {
        let mut order: Vec<usize> = (0..frames.len()).collect();
        order.sort_by_key(|i| frames[*i].tims_id);
        let mut lengths = vec![0u64; frames.len()];
        for (k, i) in order.iter().copied().enumerate() {
            let offset = frames[i].tims_id;
            let end = match order.get(k + 1) {
                Some(j) => frames[*j].tims_id,
                None => bin_length,
            };
            if offset > bin_length {
                return Err(TimsError::CorruptCatalog(format!(
                    "Frame {} starts at {offset}, past the end of the frame store ({bin_length} bytes)",
                    frames[i].id
                )));
            }
            lengths[i] = end - offset;
        }
        Ok(lengths)
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frames in ascending index order
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn precursors(&self) -> &[PrecursorRecord] {
        &self.precursors
    }

    pub fn precursor(&self, id: usize) -> Option<&PrecursorRecord> {
        self.precursors
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.precursors[i])
    }

    /// The isolation windows of DIA window group `window_group`
    pub fn quadrupole_settings(&self, window_group: u32) -> Option<&Arc<QuadrupoleSettings>> {
        self.quadrupole_settings.get(&window_group)
    }

    /// The isolation windows frame `index` was acquired with, empty for frames outside
    /// any DIA window group
    pub fn quadrupole_settings_for_frame(&self, index: usize) -> Arc<QuadrupoleSettings> {
        self.dia_frame_groups
            .get(&index)
            .and_then(|group| self.quadrupole_settings.get(group))
            .cloned()
            .unwrap_or_default()
    }

    /// The PASEF fragmentation events in catalog order
    pub fn pasef_windows(&self) -> &[PasefWindow] {
        &self.pasef_windows
    }

    /// The 1/K0 at a (possibly fractional) scan number, unchecked
    pub fn ion_mobility_at(&self, scan: f64) -> f64 {
        self.calibration.im_converter.convert(scan)
    }
}

impl MetadataProvider for TDFCatalog {
    fn calibration_model(&self) -> &CalibrationModel {
        &self.calibration
    }

    fn frame_info(&self, index: usize) -> Option<&FrameInfo> {
        self.positions.get(&index).map(|i| &self.frames[*i])
    }

    fn all_frame_indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }

    fn dia_frame_to_group(&self) -> &DiaFrameGroupMap {
        &self.dia_frame_groups
    }

    fn dia_group_to_windows(&self) -> &DiaWindowGroupMap {
        &self.dia_windows
    }

    fn acquisition_type(&self) -> AcquisitionType {
        self.acquisition_type
    }
}
