use std::{collections::HashMap, path::Path};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::{types::Value, Connection, Error, OpenFlags, Params, Row};

/// A typed row read from one table of `analysis.tdf`. The column list doubles as the
/// schema the table must provide.
pub trait FromSQL: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> Result<Self, Error>;

    fn get_sql() -> String {
        format!("SELECT {} FROM {}", Self::COLUMNS.join(", "), Self::TABLE)
    }

    fn read_from<I: Params>(connection: &Connection, params: I) -> Result<Vec<Self>, Error> {
        let sql = Self::get_sql();
        let mut stmt = connection.prepare(&sql)?;
        let out: Result<Vec<Self>, Error> = stmt
            .query_map(params, |row: &Row<'_>| Self::from_row(row))?
            .collect();
        out
    }

    fn read_from_where<I: Params>(
        connection: &Connection,
        params: I,
        condition_sql_fragment: &str,
    ) -> Result<Vec<Self>, Error> {
        let sql = Self::get_sql();
        let sql = format!("{sql} WHERE {condition_sql_fragment}");
        let mut stmt = connection.prepare(&sql)?;
        let out: Result<Vec<Self>, Error> = stmt
            .query_map(params, |row: &Row<'_>| Self::from_row(row))?
            .collect();
        out
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SQLFrame {
    pub id: usize,
    pub time: f64,
    pub msms_type: u8,
    pub tims_id: u64,
    pub num_scans: usize,
    pub num_peaks: usize,
    pub accumulation_time: f64,
}

impl FromSQL for SQLFrame {
    const TABLE: &'static str = "Frames";
    const COLUMNS: &'static [&'static str] = &[
        "Id",
        "Time",
        "MsMsType",
        "TimsId",
        "NumScans",
        "NumPeaks",
        "AccumulationTime",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            id: row.get(0)?,
            time: row.get(1)?,
            msms_type: row.get(2)?,
            tims_id: row.get(3)?,
            num_scans: row.get(4)?,
            num_peaks: row.get(5)?,
            accumulation_time: row.get::<usize, Option<f64>>(6)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SQLPrecursor {
    pub id: usize,
    pub largest_peak_mz: Option<f64>,
    pub monoisotopic_mz: Option<f64>,
    pub charge: Option<i64>,
    pub scan_number: f64,
    pub intensity: Option<f64>,
    pub parent: usize,
}

impl FromSQL for SQLPrecursor {
    const TABLE: &'static str = "Precursors";
    const COLUMNS: &'static [&'static str] = &[
        "Id",
        "LargestPeakMz",
        "MonoisotopicMz",
        "Charge",
        "ScanNumber",
        "Intensity",
        "Parent",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            id: row.get(0)?,
            largest_peak_mz: row.get(1)?,
            monoisotopic_mz: row.get(2)?,
            charge: row.get(3)?,
            scan_number: row.get(4)?,
            intensity: row.get(5)?,
            parent: row.get(6)?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SQLPasefFrameMsMs {
    pub frame: usize,
    pub scan_start: usize,
    pub scan_end: usize,
    pub isolation_mz: f64,
    pub isolation_width: f64,
    pub collision_energy: f64,
    pub precursor: usize,
}

impl FromSQL for SQLPasefFrameMsMs {
    const TABLE: &'static str = "PasefFrameMsMsInfo";
    const COLUMNS: &'static [&'static str] = &[
        "Frame",
        "ScanNumBegin",
        "ScanNumEnd",
        "IsolationMz",
        "IsolationWidth",
        "CollisionEnergy",
        "Precursor",
    ];

    fn from_row(row: &Row) -> Result<Self, Error> {
        Ok(Self {
            frame: row.get(0)?,
            scan_start: row.get(1)?,
            scan_end: row.get(2)?,
            isolation_mz: row.get(3)?,
            isolation_width: row.get(4)?,
            collision_energy: row.get(5)?,
            precursor: row.get(6)?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SQLDIAFrameMsMsInfo {
    pub frame: usize,
    pub window_group: u32,
}

impl FromSQL for SQLDIAFrameMsMsInfo {
    const TABLE: &'static str = "DiaFrameMsMsInfo";
    const COLUMNS: &'static [&'static str] = &["Frame", "WindowGroup"];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            frame: row.get(0)?,
            window_group: row.get(1)?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SQLDIAFrameMsMsWindow {
    pub window_group: u32,
    pub scan_start: usize,
    pub scan_end: usize,
    pub isolation_mz: f64,
    pub isolation_width: f64,
    pub collision_energy: f64,
}

impl FromSQL for SQLDIAFrameMsMsWindow {
    const TABLE: &'static str = "DiaFrameMsMsWindows";
    const COLUMNS: &'static [&'static str] = &[
        "WindowGroup",
        "ScanNumBegin",
        "ScanNumEnd",
        "IsolationMz",
        "IsolationWidth",
        "CollisionEnergy",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            window_group: row.get(0)?,
            scan_start: row.get(1)?,
            scan_end: row.get(2)?,
            isolation_mz: row.get(3)?,
            isolation_width: row.get(4)?,
            collision_energy: row.get(5)?,
        })
    }
}

pub struct KeyValue(pub String, pub String);

impl FromSQL for KeyValue {
    const TABLE: &'static str = "GlobalMetadata";
    const COLUMNS: &'static [&'static str] = &["Key", "Value"];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        let key = row.get(0)?;
        let val = match row.get::<usize, Value>(1)? {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s,
            Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
        };
        Ok(KeyValue(key, val))
    }
}

/// A read-only connection to `analysis.tdf`
#[derive(Debug)]
pub struct RawTDFSQLReader {
    pub connection: ReentrantMutex<Connection>,
}

impl RawTDFSQLReader {
    pub fn new(tdf_path: &Path) -> Result<Self, Error> {
        let connection = Connection::open_with_flags(
            tdf_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            connection: ReentrantMutex::new(connection),
        })
    }

    pub fn connection(&self) -> ReentrantMutexGuard<'_, Connection> {
        self.connection.lock()
    }

    pub fn metadata(&self) -> Result<HashMap<String, String>, Error> {
        Ok(KeyValue::read_from(&self.connection(), [])?
            .into_iter()
            .map(|KeyValue(k, v)| (k, v))
            .collect())
    }

    pub fn query<T: FromSQL>(&self, sql: &str, params: impl Params) -> Result<Vec<T>, Error> {
        let conn = self.connection();
        let mut stmt = conn.prepare(sql)?;
        let out: Result<Vec<T>, Error> = stmt
            .query_map(params, |row: &Row<'_>| T::from_row(row))?
            .collect();
        out
    }

    pub fn read_all<T: FromSQL>(&self) -> Result<Vec<T>, Error> {
        T::read_from(&self.connection(), [])
    }

    pub fn has_table(&self, table: &str) -> Result<bool, Error> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?")?;
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// List the column names of `table`, empty if the table does not exist
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, Error> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?)")?;
        let out: Result<Vec<String>, Error> = stmt.query_map([table], |row| row.get(0))?.collect();
        out
    }

    /// Find the columns of `T`'s table that are missing
    pub fn missing_columns<T: FromSQL>(&self) -> Result<Vec<&'static str>, Error> {
        let present = self.table_columns(T::TABLE)?;
        Ok(T::COLUMNS
            .iter()
            .copied()
            .filter(|c| !present.iter().any(|p| p == c))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::TimsError;

    fn make_db() -> Result<(tempfile::TempDir, RawTDFSQLReader), TimsError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("analysis.tdf");
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE GlobalMetadata (Key TEXT PRIMARY KEY, Value TEXT);
             INSERT INTO GlobalMetadata VALUES ('TimsCompressionType', '2'), ('MzAcqRangeLower', 100.5);
             CREATE TABLE DiaFrameMsMsInfo (Frame INTEGER, WindowGroup INTEGER);
             INSERT INTO DiaFrameMsMsInfo VALUES (2, 1), (3, 2);",
        )?;
        drop(conn);
        let reader = RawTDFSQLReader::new(&path)?;
        Ok((dir, reader))
    }

    #[test_log::test]
    fn test_schema_introspection() -> Result<(), TimsError> {
        let (_dir, reader) = make_db()?;
        assert!(reader.has_table("GlobalMetadata")?);
        assert!(!reader.has_table("Frames")?);
        assert_eq!(reader.table_columns("DiaFrameMsMsInfo")?, vec!["Frame", "WindowGroup"]);
        assert!(reader.table_columns("Frames")?.is_empty());
        assert!(reader.missing_columns::<SQLDIAFrameMsMsInfo>()?.is_empty());
        assert_eq!(reader.missing_columns::<SQLFrame>()?.len(), SQLFrame::COLUMNS.len());
        Ok(())
    }

    #[test]
    fn test_typed_rows() -> Result<(), TimsError> {
        let (_dir, reader) = make_db()?;
        let meta = reader.metadata()?;
        assert_eq!(meta.get("TimsCompressionType").map(|s| s.as_str()), Some("2"));
        assert_eq!(meta.get("MzAcqRangeLower").map(|s| s.as_str()), Some("100.5"));

        let infos: Vec<SQLDIAFrameMsMsInfo> = reader.read_all()?;
        assert_eq!(
            infos,
            vec![
                SQLDIAFrameMsMsInfo {
                    frame: 2,
                    window_group: 1
                },
                SQLDIAFrameMsMsInfo {
                    frame: 3,
                    window_group: 2
                }
            ]
        );
        let conn = reader.connection();
        let infos = SQLDIAFrameMsMsInfo::read_from_where(&conn, [3], "Frame = ?")?;
        assert_eq!(infos.len(), 1);
        assert_eq!(SQLDIAFrameMsMsInfo::get_sql(), "SELECT Frame, WindowGroup FROM DiaFrameMsMsInfo");
        Ok(())
    }
}
