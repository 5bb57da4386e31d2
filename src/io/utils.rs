use std::fs;
use std::io;

/// How much work a reader does to materialize peak data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DetailLevel {
    /// Read and decode all peak data
    #[default]
    Full,
    /// Only populate metadata, leaving peak arrays empty
    MetadataOnly,
}

/// How batch reads react to a frame that fails to decode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BatchPolicy {
    /// Abort the batch on the first error
    #[default]
    FailFast,
    /// Leave out items that fail, logging each failure
    CollectPartial,
}

/// Fill `buffer` from `file` starting at byte `offset` without moving a shared cursor,
/// so many threads can read from the same handle at once.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &fs::File, buffer: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buffer, offset)
}

#[cfg(windows)]
pub(crate) fn read_exact_at(file: &fs::File, mut buffer: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buffer.is_empty() {
        match file.seek_read(buffer, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buffer = &mut buffer[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_exact_at() -> io::Result<()> {
        let mut handle = tempfile::tempfile()?;
        handle.write_all(b"0123456789")?;
        let mut buf = [0u8; 4];
        read_exact_at(&handle, &mut buf, 3)?;
        assert_eq!(&buf, b"3456");
        let mut buf = [0u8; 4];
        let err = read_exact_at(&handle, &mut buf, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        Ok(())
    }
}
