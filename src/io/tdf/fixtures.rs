//! Synthetic `.d` directories for tests.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use rusqlite::{params, Connection};

use crate::io::TimsError;

use super::blob::encode_frame_record;
use super::constants::{TDF_BIN_FILE_NAME, TDF_FILE_NAME};

pub const NUM_SCANS: usize = 10;

const SCHEMA: &str = "
CREATE TABLE GlobalMetadata (Key TEXT PRIMARY KEY, Value TEXT);
CREATE TABLE Frames (
    Id INTEGER PRIMARY KEY, Time REAL NOT NULL, Polarity CHAR(1), ScanMode INTEGER,
    MsMsType INTEGER NOT NULL, TimsId INTEGER, MaxIntensity INTEGER, SummedIntensities INTEGER,
    NumScans INTEGER NOT NULL, NumPeaks INTEGER NOT NULL, AccumulationTime REAL
);
";

const DIA_SCHEMA: &str = "
CREATE TABLE DiaFrameMsMsInfo (Frame INTEGER PRIMARY KEY, WindowGroup INTEGER NOT NULL);
CREATE TABLE DiaFrameMsMsWindows (
    WindowGroup INTEGER NOT NULL, ScanNumBegin INTEGER NOT NULL, ScanNumEnd INTEGER NOT NULL,
    IsolationMz REAL NOT NULL, IsolationWidth REAL NOT NULL, CollisionEnergy REAL NOT NULL
);
";

const DDA_SCHEMA: &str = "
CREATE TABLE Precursors (
    Id INTEGER PRIMARY KEY, LargestPeakMz REAL NOT NULL, AverageMz REAL, MonoisotopicMz REAL,
    Charge INTEGER, ScanNumber REAL NOT NULL, Intensity REAL, Parent INTEGER
);
CREATE TABLE PasefFrameMsMsInfo (
    Frame INTEGER NOT NULL, ScanNumBegin INTEGER NOT NULL, ScanNumEnd INTEGER NOT NULL,
    IsolationMz REAL NOT NULL, IsolationWidth REAL NOT NULL, CollisionEnergy REAL,
    Precursor INTEGER
);
";

#[derive(Debug, Clone)]
pub struct FixtureFrame {
    pub msms_type: u8,
    pub time: f64,
    pub scans: Vec<Vec<(u32, u32)>>,
}

impl FixtureFrame {
    /// A frame whose peak layout depends only on its id
    pub fn generated(id: usize, msms_type: u8, time: f64) -> Self {
        let scans = (0..NUM_SCANS)
            .map(|s| {
                if (s + id) % 3 == 0 {
                    Vec::new()
                } else {
                    let tof = (1000 * s + 10 * id) as u32;
                    vec![(tof, (id * 100 + s) as u32), (tof + 5, 7)]
                }
            })
            .collect();
        Self {
            msms_type,
            time,
            scans,
        }
    }
}

/// A `.d` directory in a temporary location, removed when dropped
pub struct TdfFixture {
    _dir: tempfile::TempDir,
    path: PathBuf,
    pub frames: Vec<FixtureFrame>,
}

impl TdfFixture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tdf_path(&self) -> PathBuf {
        self.path.join(TDF_FILE_NAME)
    }

    pub fn bin_path(&self) -> PathBuf {
        self.path.join(TDF_BIN_FILE_NAME)
    }

    pub fn bin_length(&self) -> Result<u64, TimsError> {
        Ok(fs::metadata(self.bin_path())?.len())
    }

    /// A writable connection, for tests that damage the catalog
    pub fn connection(&self) -> Result<Connection, TimsError> {
        Ok(Connection::open(self.tdf_path())?)
    }

    pub fn create(
        frames: Vec<FixtureFrame>,
        setup_sql: &str,
        populate: impl FnOnce(&Connection) -> rusqlite::Result<()>,
    ) -> Result<Self, TimsError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.d");
        fs::create_dir(&path)?;

        let conn = Connection::open(path.join(TDF_FILE_NAME))?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(setup_sql)?;
        for (key, value) in [
            ("TimsCompressionType", "2"),
            ("MzAcqRangeLower", "100.0"),
            ("MzAcqRangeUpper", "1700.0"),
            ("OneOverK0AcqRangeLower", "0.6"),
            ("OneOverK0AcqRangeUpper", "1.6"),
            ("DigitizerNumSamples", "400000"),
            ("AcquisitionSoftware", "timsControl"),
            ("InstrumentName", "timsTOF Pro"),
            ("InstrumentSerialNumber", "1234"),
            ("SampleName", "fixture"),
            ("AcquisitionDateTime", "2023-07-11T10:00:00.000+02:00"),
        ] {
            conn.execute(
                "INSERT INTO GlobalMetadata (Key, Value) VALUES (?, ?)",
                params![key, value],
            )?;
        }

        let mut bin = fs::File::create(path.join(TDF_BIN_FILE_NAME))?;
        let mut offset = 0u64;
        for (i, frame) in frames.iter().enumerate() {
            let record = encode_frame_record(&frame.scans)?;
            bin.write_all(&record)?;
            let num_peaks: usize = frame.scans.iter().map(|s| s.len()).sum();
            conn.execute(
                "INSERT INTO Frames (Id, Time, Polarity, ScanMode, MsMsType, TimsId, MaxIntensity,
                    SummedIntensities, NumScans, NumPeaks, AccumulationTime)
                 VALUES (?, ?, '+', 9, ?, ?, 0, 0, ?, ?, 100.0)",
                params![
                    (i + 1) as i64,
                    frame.time,
                    frame.msms_type as i64,
                    offset as i64,
                    frame.scans.len() as i64,
                    num_peaks as i64
                ],
            )?;
            offset += record.len() as u64;
        }
        bin.flush()?;
        populate(&conn)?;

        Ok(Self {
            _dir: dir,
            path,
            frames,
        })
    }

    /// Frames 1 and 4 are MS1, frames 2 and 5 use window group 1, frame 3 uses group 2.
    /// Group 2 contains an empty window.
    pub fn dia_run() -> Result<Self, TimsError> {
        let frames = vec![
            FixtureFrame::generated(1, 0, 0.1),
            FixtureFrame::generated(2, 9, 0.2),
            FixtureFrame::generated(3, 9, 0.3),
            FixtureFrame::generated(4, 0, 0.4),
            FixtureFrame::generated(5, 9, 0.5),
        ];
        Self::create(frames, DIA_SCHEMA, |conn| {
            conn.execute_batch(
                "INSERT INTO DiaFrameMsMsInfo VALUES (2, 1), (3, 2), (5, 1);
                 INSERT INTO DiaFrameMsMsWindows VALUES
                    (1, 0, 4, 500.0, 25.0, 30.0),
                    (1, 4, 10, 525.0, 25.0, 32.0),
                    (2, 2, 2, 550.0, 25.0, 34.0),
                    (2, 2, 8, 575.0, 25.0, 36.0);",
            )
        })
    }

    /// Frames 1 and 3 are MS1, frames 2 and 4 are PASEF MS2 frames. Precursor 1 is
    /// fragmented in both MS2 frames, precursor 2 lacks a monoisotopic m/z, charge and
    /// intensity.
    pub fn dda_run() -> Result<Self, TimsError> {
        let frames = vec![
            FixtureFrame::generated(1, 0, 0.2),
            FixtureFrame::generated(2, 8, 0.3),
            FixtureFrame::generated(3, 0, 0.5),
            FixtureFrame::generated(4, 8, 0.6),
        ];
        Self::create(frames, DDA_SCHEMA, |conn| {
            conn.execute_batch(
                "INSERT INTO Precursors VALUES
                    (1, 499.9, 500.0, 500.0, 2, 4.0, 10.0, 1),
                    (2, 600.0, 600.0, NULL, NULL, 6.0, NULL, 3),
                    (3, 700.1, 700.0, 700.0, 3, 2.0, 5.0, 3);
                 INSERT INTO PasefFrameMsMsInfo VALUES
                    (2, 0, 4, 500.0, 2.0, 25.0, 1),
                    (2, 5, 9, 600.0, 2.0, 27.0, 2),
                    (4, 1, 3, 700.0, 2.0, 29.0, 3),
                    (4, 6, 8, 500.0, 2.0, 25.0, 1);",
            )
        })
    }
}
