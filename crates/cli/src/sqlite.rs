//! SQLite-backed data source.

use std::path::{Path, PathBuf};

use migcheck_recon::{DataSource, Params, RawValue, Record, SourceError};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

/// Read-only connection to one SQLite database file.
///
/// Opening never fails outright: an unopenable file yields a source whose
/// `test_connection` is false and whose queries return connection errors,
/// so the engine can decide whether the run is still meaningful.
pub struct SqliteSource {
    label: String,
    path: PathBuf,
    conn: Option<Connection>,
    open_error: Option<String>,
}

impl SqliteSource {
    pub fn open(label: &str, path: &Path) -> Self {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match Connection::open_with_flags(path, flags) {
            Ok(conn) => {
                log::debug!("{label}: opened {}", path.display());
                Self { label: label.to_string(), path: path.to_path_buf(), conn: Some(conn), open_error: None }
            }
            Err(e) => {
                log::warn!("{label}: cannot open {}: {e}", path.display());
                Self {
                    label: label.to_string(),
                    path: path.to_path_buf(),
                    conn: None,
                    open_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection_error(&self) -> SourceError {
        SourceError::Connection {
            source_label: self.label.clone(),
            message: self
                .open_error
                .clone()
                .unwrap_or_else(|| "connection closed".to_string()),
        }
    }

    fn query_error(&self, e: rusqlite::Error) -> SourceError {
        SourceError::Query { source_label: self.label.clone(), message: e.to_string() }
    }
}

fn raw_value(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(i) => RawValue::Int(i),
        ValueRef::Real(f) => RawValue::Float(f),
        ValueRef::Text(bytes) => RawValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RawValue::Text(hex::encode(bytes)),
    }
}

impl DataSource for SqliteSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn execute(&self, query: &str, _params: &Params) -> Result<Vec<Record>, SourceError> {
        let conn = self.conn.as_ref().ok_or_else(|| self.connection_error())?;

        let mut stmt = conn.prepare(query).map_err(|e| self.query_error(e))?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_lowercase()).collect();
        let mut rows = stmt.query([]).map_err(|e| self.query_error(e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| self.query_error(e))? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                let value = row.get_ref(i).map_err(|e| self.query_error(e))?;
                record.insert(name, raw_value(value));
            }
            out.push(record);
        }
        log::debug!("{}: {} rows", self.label, out.len());
        Ok(out)
    }

    fn test_connection(&self) -> bool {
        self.conn
            .as_ref()
            .map(|c| c.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok())
            .unwrap_or(false)
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("{}: error while closing: {e}", self.label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Contract (Contract_No TEXT, Balance REAL, Seq INTEGER, Note TEXT, Raw BLOB);
             INSERT INTO Contract VALUES ('C1', 100.5, 1, NULL, x'00ff');",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn maps_sqlite_types_and_lowercases_names() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open("left", &path);
        assert!(source.test_connection());

        let rows = source.execute("SELECT * FROM Contract", &Params::new()).unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.iter().next().unwrap().0, "contract_no");
        assert_eq!(r.get("CONTRACT_NO"), Some(&RawValue::Text("C1".into())));
        assert_eq!(r.get("balance"), Some(&RawValue::Float(100.5)));
        assert_eq!(r.get("seq"), Some(&RawValue::Int(1)));
        assert_eq!(r.get("note"), Some(&RawValue::Null));
        assert_eq!(r.get("raw"), Some(&RawValue::Text("00ff".into())));
    }

    #[test]
    fn bad_sql_is_a_query_error() {
        let (_dir, path) = fixture();
        let source = SqliteSource::open("left", &path);
        let err = source.execute("SELECT * FROM nope", &Params::new()).unwrap_err();
        assert!(matches!(err, SourceError::Query { .. }));
    }

    #[test]
    fn missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteSource::open("right", &dir.path().join("absent.db"));
        assert!(!source.test_connection());
        let err = source.execute("SELECT 1", &Params::new()).unwrap_err();
        assert!(matches!(err, SourceError::Connection { .. }));
    }

    #[test]
    fn closed_source_reports_connection_error() {
        let (_dir, path) = fixture();
        let mut source = SqliteSource::open("left", &path);
        source.close();
        assert!(!source.test_connection());
        let err = source.execute("SELECT 1", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("connection closed"));
    }
}
