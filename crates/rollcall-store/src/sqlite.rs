use crate::{AttendanceRecord, AttendanceStore, StoreError};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rollcall_core::Identity;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attendance (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    person_name TEXT NOT NULL,
    date        TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    UNIQUE (person_name, date)
);
CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date, timestamp);
"#;

/// SQLite-backed [`AttendanceStore`].
///
/// A single connection sits behind a mutex; every operation holds it for one
/// statement. The `UNIQUE (person_name, date)` constraint backs the
/// dedup check at the storage level as well.
pub struct SqliteAttendanceStore {
    conn: Mutex<Connection>,
}

impl SqliteAttendanceStore {
    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(dir = %parent.display(), error = %e, "cannot create database directory");
                }
            }
        }
        let conn = Connection::open(path).map_err(StoreError::Open)?;
        tracing::info!(path = %path.display(), "attendance store opened");
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(StoreError::Open)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(StoreError::Open)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied in SQLite.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttendanceStore for SqliteAttendanceStore {
    fn record_if_absent(&self, identity: &Identity, date: NaiveDate) -> Result<bool, StoreError> {
        let now = Local::now().naive_local();
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO attendance (person_name, date, timestamp) VALUES (?1, ?2, ?3)",
                params![identity.as_str(), date, now],
            )
            .map_err(StoreError::Write)?;

        if inserted == 1 {
            tracing::info!(%identity, %date, "attendance recorded");
        }
        Ok(inserted == 1)
    }

    fn report(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT person_name, timestamp FROM attendance
                 WHERE date = ?1
                 ORDER BY timestamp, id",
            )
            .map_err(StoreError::Read)?;

        let rows = stmt
            .query_map(params![date], |row| {
                Ok(AttendanceRecord {
                    identity: Identity::new(row.get::<_, String>(0)?),
                    date,
                    recorded_at: row.get::<_, NaiveDateTime>(1)?,
                })
            })
            .map_err(StoreError::Read)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Read)
    }
}
