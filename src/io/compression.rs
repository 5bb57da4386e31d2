use std::path;

/// Check for the gzip magic bytes
pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

/// Check whether `path` carries a `.gz` extension, returning the path with
/// that extension stripped when it does
pub fn is_gzipped_extension(path: path::PathBuf) -> (bool, path::PathBuf) {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("gz") => (true, path.with_extension("")),
        _ => (false, path),
    }
}
