use std::{
    fmt::Display,
    fs,
    io::{self, prelude::*, BufReader},
    path,
};

use flate2::bufread::GzDecoder;

use crate::io::{
    compression::{is_gzipped, is_gzipped_extension},
    ms2::is_ms2,
    tdf::is_tdf,
    TimsError,
};

/// The data formats this crate reads
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MassSpectrometryFormat {
    BrukerTDF,
    MS2,
    Unknown,
}

impl Display for MassSpectrometryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Given a path, infer the data format and whether or not the file at that path is
/// GZIP compressed
pub fn infer_from_path<P: Into<path::PathBuf>>(path: P) -> (MassSpectrometryFormat, bool) {
    let path: path::PathBuf = path.into();
    if path.is_dir() {
        if is_tdf(&path) {
            return (MassSpectrometryFormat::BrukerTDF, false);
        } else {
            return (MassSpectrometryFormat::Unknown, false);
        }
    }
    let (is_gzipped, path) = is_gzipped_extension(path);
    let form = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("ms2") => MassSpectrometryFormat::MS2,
        _ => MassSpectrometryFormat::Unknown,
    };
    (form, is_gzipped)
}

/// Given a stream of bytes, infer the data format and whether or not the
/// stream is GZIP compressed. The stream is returned to its starting position.
pub fn infer_from_stream<R: Read + Seek>(
    stream: &mut R,
) -> io::Result<(MassSpectrometryFormat, bool)> {
    let mut buf = vec![0u8; 500];
    let current_pos = stream.stream_position()?;
    let bytes_read = stream.read(buf.as_mut_slice())?;
    buf.truncate(bytes_read);
    let is_stream_gzipped = is_gzipped(buf.as_slice());
    if is_stream_gzipped {
        // A truncated gzip member cannot be decoded to its end, so only take what
        // decompresses from the prefix
        let mut decompressed_buf = Vec::new();
        let mut decoder = GzDecoder::new(io::Cursor::new(buf));
        let mut chunk = [0u8; 256];
        loop {
            match decoder.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => decompressed_buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        buf = decompressed_buf;
    }
    stream.seek(io::SeekFrom::Start(current_pos))?;

    if is_ms2(&buf) {
        Ok((MassSpectrometryFormat::MS2, is_stream_gzipped))
    } else {
        Ok((MassSpectrometryFormat::Unknown, is_stream_gzipped))
    }
}

/// Given a path, infer the data format and whether or not the file at that path is
/// GZIP compressed, using both the file name and the file's leading bytes.
///
/// # Errors
/// [`TimsError::NotFound`] for a missing path, [`TimsError::UnsupportedFormat`] when no
/// format is recognized.
pub fn infer_format<P: Into<path::PathBuf>>(
    path: P,
) -> Result<(MassSpectrometryFormat, bool), TimsError> {
    let path: path::PathBuf = path.into();
    if !path.exists() {
        return Err(TimsError::NotFound(path));
    }

    let (format, is_gzipped) = match infer_from_path(&path) {
        (MassSpectrometryFormat::Unknown, _) if path.is_file() => {
            let handle = fs::File::open(&path)?;
            let mut stream = BufReader::new(handle);
            infer_from_stream(&mut stream)?
        }
        found => found,
    };
    match format {
        MassSpectrometryFormat::Unknown => Err(TimsError::UnsupportedFormat(path)),
        _ => Ok((format, is_gzipped)),
    }
}
