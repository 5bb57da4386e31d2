use std::{
    fs,
    io::{self, prelude::*, SeekFrom},
    path::Path,
    str,
};

use flate2::read::MultiGzDecoder;
use log::warn;
use thiserror::Error;

use crate::spectrum::{Precursor, Spectrum};

use super::super::{offset_index::OffsetIndex, utils::DetailLevel};

const PROTON: f64 = 1.00727646677;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MS2ParserState {
    Start,
    Headers,
    Peaks,
    Between,
    Done,
    Error,
}

#[derive(Debug, Error)]
pub enum MS2Error {
    #[error("Malformed spectrum record on line {line}: {reason}")]
    MalformedSpectrumRecord { line: usize, reason: String },
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

#[derive(Debug, Default)]
struct SpectrumBuilder {
    scan: u64,
    precursor_mz: Option<f64>,
    charge: Option<usize>,
    neutral_mass: Option<f64>,
    rt: f64,
    im: f64,
    precursor_intensity: f64,
    collision_energy: f64,
    mz_values: Vec<f64>,
    intensities: Vec<f64>,
}

impl SpectrumBuilder {
    fn precursor_mz(&self) -> f64 {
        match (self.precursor_mz, self.charge, self.neutral_mass) {
            (Some(mz), _, _) => mz,
            (None, Some(z), Some(mass)) => (mass + (z as f64 - 1.0) * PROTON) / z as f64,
            _ => 0.0,
        }
    }

    fn build(self, index: usize) -> Spectrum {
        let mz = self.precursor_mz();
        Spectrum {
            index,
            precursor: Some(Precursor {
                mz,
                rt: self.rt,
                im: self.im,
                charge: self.charge,
                intensity: self.precursor_intensity,
                index: self.scan as usize,
                frame_index: 0,
            }),
            collision_energy: self.collision_energy,
            isolation_mz: mz,
            isolation_width: 0.0,
            mz_values: self.mz_values,
            intensities: self.intensities,
        }
    }
}

/// A parser for the line-oriented MS2 text format.
///
/// Each spectrum opens with an `S` line, followed by `I` and `Z` lines describing the
/// precursor and then `mz intensity` peak lines until the next `S` line or the end of
/// the file. `H` header lines and `D` lines are skipped. Recognized `I` tags are
/// `RTime`/`RetTime`/`RT`, `IonMobility`/`IM`/`OneOverK0`, `PrecursorIntensity`/
/// `PrecIntensity`/`Intensity` and `CollisionEnergy`. Values are taken as written.
///
/// The reader yields `Result<Spectrum, MS2Error>` and stops after the first error.
/// When the source supports [`io::Seek`] an [`OffsetIndex`] over `S` lines allows
/// random access, see [`MS2ReaderType::new_indexed`].
pub struct MS2ReaderType<R: io::Read> {
    pub handle: io::BufReader<R>,
    pub state: MS2ParserState,
    pub detail_level: DetailLevel,
    line_number: usize,
    spectrum_count: usize,
    pending: Option<String>,
    index: OffsetIndex,
    /// The number of lines preceding each indexed `S` line, by index position
    line_starts: Vec<usize>,
}

fn malformed<S: Into<String>>(line: usize, reason: S) -> MS2Error {
    MS2Error::MalformedSpectrumRecord {
        line,
        reason: reason.into(),
    }
}

fn parse_field<T: str::FromStr>(
    token: Option<&str>,
    line: usize,
    what: &str,
) -> Result<T, MS2Error> {
    let token = token.ok_or_else(|| malformed(line, format!("Missing {what}")))?;
    token
        .parse()
        .map_err(|_| malformed(line, format!("Invalid {what} {token:?}")))
}

impl<R: io::Read> MS2ReaderType<R> {
    /// Create a new, unindexed MS2 parser
    pub fn new(file: R) -> MS2ReaderType<R> {
        MS2ReaderType {
            handle: io::BufReader::new(file),
            state: MS2ParserState::Start,
            detail_level: DetailLevel::Full,
            line_number: 0,
            spectrum_count: 0,
            pending: None,
            index: OffsetIndex::new(),
            line_starts: Vec::new(),
        }
    }

    pub fn get_index(&self) -> &OffsetIndex {
        &self.index
    }

    /// The number of spectra, if the file has been indexed
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn next_line(&mut self, buffer: &mut String) -> Result<bool, MS2Error> {
        buffer.clear();
        if let Some(line) = self.pending.take() {
            buffer.push_str(&line);
            return Ok(true);
        }
        let b = self.handle.read_line(buffer)?;
        if b > 0 {
            self.line_number += 1;
        }
        Ok(b > 0)
    }

    fn handle_scan_line(&self, line: &str, builder: &mut SpectrumBuilder) -> Result<(), MS2Error> {
        let mut tokens = line.split_ascii_whitespace().skip(1);
        builder.scan = parse_field(tokens.next(), self.line_number, "scan number")?;
        let _last_scan: Option<u64> = tokens
            .next()
            .map(|t| parse_field(Some(t), self.line_number, "scan number"))
            .transpose()?;
        builder.precursor_mz = tokens
            .next()
            .map(|t| parse_field(Some(t), self.line_number, "precursor m/z"))
            .transpose()?;
        Ok(())
    }

    fn handle_charge_line(&self, line: &str, builder: &mut SpectrumBuilder) -> Result<(), MS2Error> {
        let mut tokens = line.split_ascii_whitespace().skip(1);
        let charge: i64 = parse_field(tokens.next(), self.line_number, "charge")?;
        let mass: f64 = parse_field(tokens.next(), self.line_number, "mass")?;
        if builder.charge.is_some() || builder.neutral_mass.is_some() {
            return Ok(());
        }
        builder.charge = usize::try_from(charge).ok().filter(|z| *z > 0);
        builder.neutral_mass = Some(mass);
        Ok(())
    }

    fn handle_info_line(&self, line: &str, builder: &mut SpectrumBuilder) -> Result<(), MS2Error> {
        let mut tokens = line.split_ascii_whitespace().skip(1);
        let Some(tag) = tokens.next() else {
            return Err(malformed(self.line_number, "I line without a tag"));
        };
        let slot = match tag {
            "RTime" | "RetTime" | "RT" => &mut builder.rt,
            "IonMobility" | "IM" | "OneOverK0" => &mut builder.im,
            "PrecursorIntensity" | "PrecIntensity" | "Intensity" => &mut builder.precursor_intensity,
            "CollisionEnergy" => &mut builder.collision_energy,
            _ => return Ok(()),
        };
        *slot = parse_field(tokens.next(), self.line_number, tag)?;
        Ok(())
    }

    fn handle_peak_line(&self, line: &str, builder: &mut SpectrumBuilder) -> Result<(), MS2Error> {
        let mut tokens = line.split_ascii_whitespace();
        let mz: f64 = parse_field(tokens.next(), self.line_number, "peak m/z")?;
        let intensity: f64 = parse_field(tokens.next(), self.line_number, "peak intensity")?;
        if !matches!(self.detail_level, DetailLevel::MetadataOnly) {
            builder.mz_values.push(mz);
            builder.intensities.push(intensity);
        }
        Ok(())
    }

    fn parse_next(&mut self) -> Result<Option<Spectrum>, MS2Error> {
        let mut buffer = String::new();
        let mut builder = SpectrumBuilder::default();
        let mut started = false;

        while self.next_line(&mut buffer)? {
            let line = buffer.trim();
            if line.is_empty() {
                continue;
            }
            let Some(first) = line.chars().next() else {
                continue;
            };
            match first {
                'S' => {
                    if started {
                        self.pending = Some(line.to_string());
                        self.state = MS2ParserState::Between;
                        break;
                    }
                    self.handle_scan_line(line, &mut builder)?;
                    started = true;
                    self.state = MS2ParserState::Headers;
                }
                'H' | 'D' => {}
                'Z' if started => self.handle_charge_line(line, &mut builder)?,
                'I' if started => self.handle_info_line(line, &mut builder)?,
                'Z' | 'I' => {
                    return Err(malformed(
                        self.line_number,
                        format!("{first} line outside of a spectrum"),
                    ))
                }
                c if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => {
                    if !started {
                        return Err(malformed(self.line_number, "Peak line outside of a spectrum"));
                    }
                    self.handle_peak_line(line, &mut builder)?;
                    self.state = MS2ParserState::Peaks;
                }
                _ => {
                    warn!("Skipping unrecognized line {}: {line:?}", self.line_number);
                }
            }
        }

        if self.pending.is_none() {
            self.state = MS2ParserState::Done;
        }
        if !started {
            return Ok(None);
        }
        let spectrum = builder.build(self.spectrum_count);
        self.spectrum_count += 1;
        Ok(Some(spectrum))
    }

    /// Read the next spectrum from the file, if there is one.
    pub fn read_next(&mut self) -> Option<Result<Spectrum, MS2Error>> {
        if matches!(self.state, MS2ParserState::Done | MS2ParserState::Error) {
            return None;
        }
        match self.parse_next() {
            Ok(spectrum) => spectrum.map(Ok),
            Err(e) => {
                self.state = MS2ParserState::Error;
                Some(Err(e))
            }
        }
    }
}

impl<R: io::Read> Iterator for MS2ReaderType<R> {
    type Item = Result<Spectrum, MS2Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

impl<R: io::Read + io::Seek> MS2ReaderType<R> {
    /// Construct a new reader and build an offset index using [`Self::build_index`]
    pub fn new_indexed(file: R) -> io::Result<MS2ReaderType<R>> {
        let mut reader = Self::new(file);
        reader.build_index()?;
        Ok(reader)
    }

    /// Builds an offset index to each `S` line by doing a fast pre-scan of the file.
    /// Returns the number of bytes scanned.
    pub fn build_index(&mut self) -> io::Result<u64> {
        let start = self.handle.stream_position()?;
        self.handle.seek(SeekFrom::Start(0))?;

        let mut offset: u64 = 0;
        let mut lines: usize = 0;
        let mut buffer: Vec<u8> = Vec::new();
        self.index.clear();
        self.line_starts.clear();
        loop {
            buffer.clear();
            let b = self.handle.read_until(b'\n', &mut buffer)?;
            if b == 0 {
                break;
            }
            if buffer.starts_with(b"S") {
                let scan = str::from_utf8(&buffer[1..])
                    .ok()
                    .and_then(|s| s.split_ascii_whitespace().next())
                    .and_then(|s| s.parse::<u64>().ok());
                match scan {
                    Some(scan) => {
                        if self.index.insert(scan, offset).is_some() {
                            warn!("Scan {scan} appears more than once, indexing its last record");
                            if let Some(position) = self.index.index_of(scan) {
                                self.line_starts[position] = lines;
                            }
                        } else {
                            self.line_starts.push(lines);
                        }
                    }
                    None => warn!("Could not index the S line at byte {offset}"),
                }
            }
            offset += b as u64;
            lines += 1;
        }
        self.handle.seek(SeekFrom::Start(start))?;
        self.index.init = true;
        if self.index.is_empty() {
            warn!("An index was built but no entries were found")
        }
        Ok(offset)
    }

    fn read_at(&mut self, position: usize, offset: u64) -> Result<Spectrum, MS2Error> {
        self.handle.seek(SeekFrom::Start(offset))?;
        self.pending = None;
        self.state = MS2ParserState::Between;
        self.spectrum_count = position;
        self.line_number = self.line_starts.get(position).copied().unwrap_or_default();
        match self.read_next() {
            Some(result) => result,
            None => Err(malformed(self.line_number, "No spectrum at indexed offset")),
        }
    }

    /// Read the `index`-th spectrum of the file and continue iterating after it
    pub fn get_spectrum_by_index(&mut self, index: usize) -> Option<Result<Spectrum, MS2Error>> {
        let (_, offset) = self.index.get_index(index)?;
        Some(self.read_at(index, offset))
    }

    /// Read the spectrum whose `S` line starts with `scan`
    pub fn get_spectrum_by_scan(&mut self, scan: u64) -> Option<Result<Spectrum, MS2Error>> {
        let offset = self.index.get(scan)?;
        let position = self.index.index_of(scan)?;
        Some(self.read_at(position, offset))
    }

    /// Return to the start of the file
    pub fn reset(&mut self) -> io::Result<()> {
        self.handle.seek(SeekFrom::Start(0))?;
        self.pending = None;
        self.state = MS2ParserState::Start;
        self.spectrum_count = 0;
        self.line_number = 0;
        Ok(())
    }
}

/// An indexed MS2 reader over a plain file
pub type MS2Reader = MS2ReaderType<fs::File>;

/// A streaming MS2 reader over a gzip-compressed file
pub type MS2GzReader = MS2ReaderType<MultiGzDecoder<fs::File>>;

impl MS2Reader {
    /// Open and index the MS2 file at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<MS2Reader> {
        Self::new_indexed(fs::File::open(path)?)
    }
}

impl MS2GzReader {
    /// Open the gzip-compressed MS2 file at `path`. Compressed files are read
    /// sequentially and have no index.
    pub fn open_gzipped_path<P: AsRef<Path>>(path: P) -> io::Result<MS2GzReader> {
        Ok(Self::new(MultiGzDecoder::new(fs::File::open(path)?)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    const TEST_MS2: &str = "H\tCreationDate\t2023-07-11\n\
H\tExtractor\ttimsTOF\n\
S\t1\t1\t500.0\n\
I\tRTime\t0.1\n\
I\tIonMobility\t1.3\n\
Z\t2\t999.0\n\
190.10706 350\n\
S\t2\t2\t600.5\n\
I\tRetTime\t0.2\n\
I\tIM\t1.1\n\
I\tPrecursorIntensity\t1500.0\n\
I\tTIC\t30\n\
Z\t3\t1799.4\n\
200.0 10\n\
300.5 20\n\
\n\
S\t3\t3\n\
I\tRT\t0.3\n\
Z\t2\t1399.49\n\
150.0\t5\n";

    #[test_log::test]
    fn test_reader() -> Result<(), MS2Error> {
        let reader = MS2ReaderType::new(Cursor::new(TEST_MS2.as_bytes()));
        let spectra: Vec<Spectrum> = reader.collect::<Result<_, _>>()?;
        assert_eq!(spectra.len(), 3);

        let first = &spectra[0];
        assert_eq!(first.mz_values, vec![190.10706]);
        assert_eq!(first.intensities, vec![350.0]);
        let precursor = first.precursor.unwrap();
        assert_eq!(precursor.mz, 500.0);
        assert_eq!(precursor.rt, 0.1);
        assert_eq!(precursor.im, 1.3);
        assert_eq!(precursor.charge, Some(2));
        assert_eq!(precursor.intensity, 0.0);
        assert_eq!(precursor.index, 1);

        let second = &spectra[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.len(), 2);
        let precursor = second.precursor.unwrap();
        assert_eq!(precursor.rt, 0.2);
        assert_eq!(precursor.im, 1.1);
        assert_eq!(precursor.intensity, 1500.0);
        assert_eq!(precursor.charge, Some(3));

        let third = spectra[2].precursor.unwrap();
        assert!((third.mz - (1399.49 + PROTON) / 2.0).abs() < 1e-9);
        assert_eq!(third.rt, 0.3);
        assert_eq!(spectra[2].mz_values, vec![150.0]);
        Ok(())
    }

    #[test]
    fn test_indexed() -> Result<(), MS2Error> {
        let mut reader = MS2ReaderType::new_indexed(Cursor::new(TEST_MS2.as_bytes()))?;
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.get_index().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let spectrum = reader.get_spectrum_by_index(1).unwrap()?;
        assert_eq!(spectrum.index, 1);
        assert_eq!(spectrum.precursor.unwrap().mz, 600.5);
        let next = reader.next().unwrap()?;
        assert_eq!(next.index, 2);
        assert!(reader.next().is_none());

        let spectrum = reader.get_spectrum_by_scan(1).unwrap()?;
        assert_eq!(spectrum.mz_values, vec![190.10706]);
        assert!(reader.get_spectrum_by_scan(9).is_none());
        assert!(reader.get_spectrum_by_index(3).is_none());

        reader.reset()?;
        assert_eq!(reader.count(), 3);
        Ok(())
    }

    #[test]
    fn test_indexed_error_lines() -> Result<(), MS2Error> {
        let text = "H\tExtractor\tnone\nS\t1\t1\t500.0\n100.0 5\nS\t2\t2\t600.0\n200.0 x\n";
        let mut reader = MS2ReaderType::new_indexed(Cursor::new(text.as_bytes()))?;
        assert_eq!(reader.len(), 2);
        let err = reader.get_spectrum_by_index(1).unwrap().unwrap_err();
        assert!(
            matches!(err, MS2Error::MalformedSpectrumRecord { line: 5, .. }),
            "{err}"
        );
        let spectrum = reader.get_spectrum_by_scan(1).unwrap()?;
        assert_eq!(spectrum.mz_values, vec![100.0]);
        let err = reader.next().unwrap().unwrap_err();
        assert!(
            matches!(err, MS2Error::MalformedSpectrumRecord { line: 5, .. }),
            "{err}"
        );
        Ok(())
    }

    #[test]
    fn test_metadata_only() -> Result<(), MS2Error> {
        let mut reader = MS2ReaderType::new(Cursor::new(TEST_MS2.as_bytes()));
        reader.detail_level = DetailLevel::MetadataOnly;
        let spectra: Vec<Spectrum> = reader.collect::<Result<_, _>>()?;
        assert_eq!(spectra.len(), 3);
        assert!(spectra.iter().all(|s| s.is_empty()));
        assert_eq!(spectra[0].precursor.unwrap().charge, Some(2));
        Ok(())
    }

    #[test]
    fn test_malformed() {
        let text = "H\tExtractor\tnone\n100.0 5\n";
        let mut reader = MS2ReaderType::new(Cursor::new(text.as_bytes()));
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            MS2Error::MalformedSpectrumRecord { line: 2, .. }
        ));
        assert!(reader.next().is_none());

        let text = "S\t1\t1\t500.0\nZ\ttwo\t999.0\n100.0 5\n";
        let mut reader = MS2ReaderType::new(Cursor::new(text.as_bytes()));
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            MS2Error::MalformedSpectrumRecord { line: 2, .. }
        ));

        let text = "S\t1\t1\t500.0\n100.0\n";
        let mut reader = MS2ReaderType::new(Cursor::new(text.as_bytes()));
        assert!(reader.next().unwrap().is_err());

        let text = "S\t1\t1\t500.0\nI\tRTime\tlate\n";
        let mut reader = MS2ReaderType::new(Cursor::new(text.as_bytes()));
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn test_empty_file() {
        let mut reader = MS2ReaderType::new(Cursor::new(b"H\tonly headers\n".as_slice()));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_gzipped() -> io::Result<()> {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.ms2.gz");
        let mut encoder = GzEncoder::new(fs::File::create(&path)?, Compression::default());
        encoder.write_all(TEST_MS2.as_bytes())?;
        encoder.finish()?;

        let reader = MS2GzReader::open_gzipped_path(&path)?;
        let spectra: Vec<Spectrum> = reader.collect::<Result<_, _>>().map_err(io::Error::other)?;
        assert_eq!(spectra.len(), 3);
        assert_eq!(spectra[0].mz_values, vec![190.10706]);
        Ok(())
    }
}
