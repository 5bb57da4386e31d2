//! Read MS2 text files, a line-oriented format for MS/MS spectra and their precursors.
//! Supports random access when reading from a source that supports [`io::Seek`](std::io::Seek),
//! and reads gzip-compressed `.ms2.gz` files sequentially.
mod reader;

pub use reader::{MS2Error, MS2GzReader, MS2ParserState, MS2Reader, MS2ReaderType};

/// Test whether `buf` looks like the start of an MS2 file
pub fn is_ms2(buf: &[u8]) -> bool {
    buf.split(|b| *b == b'\n')
        .map(|line| line.trim_ascii_start())
        .find(|line| !line.is_empty() && !line.starts_with(b"H"))
        .is_some_and(|line| line.starts_with(b"S\t") || line.starts_with(b"S "))
}
