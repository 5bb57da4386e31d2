use std::{io, path::PathBuf};

use thiserror::Error;

use crate::calibration::CalibrationError;

use super::ms2::MS2Error;
use super::tdf::FrameDecodeError;

/// The errors that reading a timsTOF run or MS2 file can produce.
#[derive(Debug, Error)]
pub enum TimsError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
    #[error("Catalog does not match the expected schema: {0}")]
    SchemaMismatch(String),
    #[error("Catalog is internally inconsistent: {0}")]
    CorruptCatalog(String),
    #[error(transparent)]
    FrameDecode(#[from] FrameDecodeError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("Index {0} was not found")]
    IndexNotFound(usize),
    #[error(transparent)]
    MS2(#[from] MS2Error),
    #[error("The catalog has been closed")]
    CatalogClosed,
    #[error("Could not infer a supported format for {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
    #[error("Encountered an SQL error: {0}")]
    SQLError(
        #[from]
        #[source]
        rusqlite::Error,
    ),
}

impl From<TimsError> for io::Error {
    fn from(value: TimsError) -> Self {
        let kind = match &value {
            TimsError::NotFound(_) | TimsError::IndexNotFound(_) => io::ErrorKind::NotFound,
            TimsError::SchemaMismatch(_)
            | TimsError::CorruptCatalog(_)
            | TimsError::FrameDecode(_)
            | TimsError::MS2(_) => io::ErrorKind::InvalidData,
            TimsError::Calibration(_) => io::ErrorKind::InvalidInput,
            TimsError::UnsupportedFormat(_) => io::ErrorKind::Unsupported,
            TimsError::CatalogClosed => io::ErrorKind::BrokenPipe,
            TimsError::IOError(e) => e.kind(),
            TimsError::SQLError(_) => io::ErrorKind::Other,
        };
        match value {
            TimsError::IOError(e) => e,
            e => io::Error::new(kind, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_io_error_kinds() {
        let e: io::Error = TimsError::IndexNotFound(42).into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
        assert!(e.to_string().contains("42"));

        let e: io::Error = TimsError::CatalogClosed.into();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let e: io::Error =
            TimsError::FrameDecode(FrameDecodeError::MalformedFrame("bad".into())).into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);

        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let e: io::Error = TimsError::from(inner).into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }
}
