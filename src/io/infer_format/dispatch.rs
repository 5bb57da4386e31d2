use std::{
    fmt::Debug,
    io,
    path::{Path, PathBuf},
};

use crate::io::{
    ms2::{MS2GzReader, MS2Reader},
    tdf::{FrameReader, TDFSpectrumReader},
    BatchPolicy, DetailLevel, TimsError,
};
use crate::spectrum::Spectrum;

use super::inference::{infer_format, MassSpectrometryFormat};

/// A builder for [`SpectrumReader`], see [`SpectrumReader::build`]
#[derive(Debug, Default, Clone)]
pub struct SpectrumReaderBuilder {
    path: Option<PathBuf>,
    detail_level: DetailLevel,
    threads: Option<usize>,
    batch_policy: BatchPolicy,
}

impl SpectrumReaderBuilder {
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the detail level for controlling how much work the reader
    /// will do to load peak information from spectra.
    pub fn with_detail_level(mut self, detail_level: DetailLevel) -> Self {
        self.detail_level = detail_level;
        self
    }

    /// The number of frame decoding threads, for TDF runs
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// The batch policy frame decoding follows, for TDF runs
    pub fn with_batch_policy(mut self, batch_policy: BatchPolicy) -> Self {
        self.batch_policy = batch_policy;
        self
    }

    pub fn finalize(self) -> Result<SpectrumReader, TimsError> {
        let path = self.path.ok_or_else(|| {
            TimsError::IOError(io::Error::new(
                io::ErrorKind::InvalidInput,
                "No path was given to the spectrum reader builder",
            ))
        })?;
        let (format, is_gzipped) = infer_format(&path)?;
        let reader = match format {
            MassSpectrometryFormat::BrukerTDF => {
                let mut builder = FrameReader::build()
                    .with_path(&path)
                    .with_detail_level(self.detail_level)
                    .with_batch_policy(self.batch_policy);
                if let Some(threads) = self.threads {
                    builder = builder.with_threads(threads);
                }
                let reader = TDFSpectrumReader::from_frame_reader(builder.finalize()?)?;
                SpectrumReader::BrukerTDF(Box::new(reader), 0)
            }
            MassSpectrometryFormat::MS2 if is_gzipped => {
                let mut reader = MS2GzReader::open_gzipped_path(&path)?;
                reader.detail_level = self.detail_level;
                SpectrumReader::MS2Gz(reader)
            }
            MassSpectrometryFormat::MS2 => {
                let mut reader = MS2Reader::open_path(&path)?;
                reader.detail_level = self.detail_level;
                SpectrumReader::MS2(reader)
            }
            MassSpectrometryFormat::Unknown => return Err(TimsError::UnsupportedFormat(path)),
        };
        log::debug!("Opened {} as {}", path.display(), reader.format());
        Ok(reader)
    }
}

/// A reader for any supported spectrum source, picked by inspecting the path.
///
/// Iterating yields every spectrum in source order. TDF runs and plain MS2 files also
/// support random access by position.
#[non_exhaustive]
pub enum SpectrumReader {
    /// A timsTOF run and the position of the next spectrum to yield
    BrukerTDF(Box<TDFSpectrumReader>, usize),
    MS2(MS2Reader),
    MS2Gz(MS2GzReader),
}

impl Debug for SpectrumReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BrukerTDF(reader, position) => f
                .debug_tuple("BrukerTDF")
                .field(reader)
                .field(position)
                .finish(),
            Self::MS2(reader) => f.debug_tuple("MS2").field(&reader.len()).finish(),
            Self::MS2Gz(_) => f.debug_tuple("MS2Gz").finish(),
        }
    }
}

impl SpectrumReader {
    pub fn build() -> SpectrumReaderBuilder {
        SpectrumReaderBuilder::default()
    }

    /// Open the file or `.d` directory at `path` with default settings
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, TimsError> {
        Self::build().with_path(path).finalize()
    }

    pub fn format(&self) -> MassSpectrometryFormat {
        match self {
            Self::BrukerTDF(..) => MassSpectrometryFormat::BrukerTDF,
            Self::MS2(_) | Self::MS2Gz(_) => MassSpectrometryFormat::MS2,
        }
    }

    /// The number of spectra, if known without reading the whole source
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            Self::BrukerTDF(reader, _) => Some(reader.len()),
            Self::MS2(reader) => Some(reader.len()),
            Self::MS2Gz(_) => None,
        }
    }

    /// Read the spectrum at `index`, `None` when out of range or when the source
    /// cannot be accessed randomly
    pub fn get_spectrum_by_index(&mut self, index: usize) -> Option<Result<Spectrum, TimsError>> {
        match self {
            Self::BrukerTDF(reader, position) => {
                if index >= reader.len() {
                    return None;
                }
                *position = index + 1;
                Some(reader.get_spectrum(index))
            }
            Self::MS2(reader) => reader
                .get_spectrum_by_index(index)
                .map(|r| r.map_err(TimsError::from)),
            Self::MS2Gz(_) => None,
        }
    }

    /// Read every remaining spectrum, failing on the first error
    pub fn read_all_spectra(&mut self) -> Result<Vec<Spectrum>, TimsError> {
        match self {
            Self::BrukerTDF(reader, position) if *position == 0 => {
                *position = reader.len();
                reader.read_all_spectra()
            }
            _ => self.collect(),
        }
    }
}

impl Iterator for SpectrumReader {
    type Item = Result<Spectrum, TimsError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::BrukerTDF(reader, position) => {
                if *position >= reader.len() {
                    return None;
                }
                let result = reader.get_spectrum(*position);
                *position += 1;
                Some(result)
            }
            Self::MS2(reader) => reader.next().map(|r| r.map_err(TimsError::from)),
            Self::MS2Gz(reader) => reader.next().map(|r| r.map_err(TimsError::from)),
        }
    }
}
