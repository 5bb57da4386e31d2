use std::path::Path;

use crate::spectrum::{Frame, Spectrum};

use super::{tdf::FrameReader, SpectrumReader, TimsError};

/// Read every frame of the `.d` directory at `path` in ascending index order. The run is
/// closed before returning.
///
/// ```no_run
/// # fn main() -> Result<(), mztims::io::TimsError> {
/// let frames = mztims::read_all_frames("./run.d")?;
/// for frame in frames.iter() {
///     assert_eq!(frame.scan_offsets.last().copied().unwrap_or_default(), frame.tof_indices.len());
/// }
/// # Ok(())
/// # }
/// ```
pub fn read_all_frames<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>, TimsError> {
    let reader = FrameReader::new(path)?;
    let frames = reader.read_all_frames();
    reader.close();
    frames
}

/// Read every spectrum of a `.d` directory or MS2 file at `path`, inferring the format
/// from the path.
pub fn read_all_spectra<P: AsRef<Path>>(path: P) -> Result<Vec<Spectrum>, TimsError> {
    SpectrumReader::open_path(path)?.read_all_spectra()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::tdf::fixtures::TdfFixture;

    #[test]
    fn test_one_shot_frames() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let one_shot = read_all_frames(fixture.path())?;
        let reader = FrameReader::new(fixture.path())?;
        assert_eq!(one_shot, reader.read_all_frames()?);
        assert_eq!(one_shot.len(), 5);
        Ok(())
    }

    #[test]
    fn test_one_shot_spectra() -> Result<(), TimsError> {
        let fixture = TdfFixture::dia_run()?;
        let spectra = read_all_spectra(fixture.path())?;
        assert_eq!(spectra.len(), 6);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("one.ms2");
        std::fs::write(&path, "S\t7\t7\t421.7\nZ\t2\t842.4\n101.1 3\n")?;
        let spectra = read_all_spectra(&path)?;
        assert_eq!(spectra.len(), 1);
        assert_eq!(spectra[0].precursor.unwrap().index, 7);

        assert!(matches!(
            read_all_frames(dir.path().join("missing.d")),
            Err(TimsError::NotFound(_))
        ));
        Ok(())
    }
}
