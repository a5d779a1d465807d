//! rollcall-store — Date-scoped, deduplicating attendance events.
//!
//! At most one event exists per (identity, date); the first recognition of
//! the day wins. Events are append-only: nothing here updates or deletes them.

pub mod sqlite;

pub use sqlite::SqliteAttendanceStore;

use chrono::{NaiveDate, NaiveDateTime};
use rollcall_core::Identity;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot open attendance store: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("attendance write failed: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("attendance read failed: {0}")]
    Read(#[source] rusqlite::Error),
}

/// One attendance event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub identity: Identity,
    pub date: NaiveDate,
    /// Local wall-clock time of the first recognition that day.
    pub recorded_at: NaiveDateTime,
}

/// Thread-safe attendance log.
pub trait AttendanceStore: Send + Sync {
    /// Record `identity` for `date` unless already present.
    ///
    /// Returns `Ok(true)` when this call created the event and `Ok(false)` when
    /// one already existed. Concurrent callers racing on the same pair see
    /// exactly one `true`.
    fn record_if_absent(&self, identity: &Identity, date: NaiveDate) -> Result<bool, StoreError>;

    /// All events for `date`, oldest first.
    fn report(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError>;
}
