//! Database module for homecare.
//!
//! This module owns the SQLite connection and everything that touches it:
//! the identity store ([`accounts`]), the service-request store
//! ([`requests`]) and the medical-question store ([`questions`]). The schema
//! lives in `schema.sql` and is applied every time a database is opened.
//!
//! Lifecycle mutations are written as single conditional updates
//! (`UPDATE ... WHERE status = ?`) and report whether a row changed, so two
//! callers racing on the same record can never both succeed.

use rusqlite::{types::Type, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

pub mod accounts;
pub mod questions;
pub mod requests;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The email is already registered (emails are unique regardless of case).
    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Handle to the application's database.
///
/// One connection behind a mutex. Every method takes the lock for the
/// duration of a single statement or transaction and never across an
/// `.await`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// applied.
    ///
    /// # Side Effects
    ///
    /// Creates the database file and its tables if they don't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening database");
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;

        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection. A poisoned lock still holds a usable
    /// connection, since SQLite rolls back any unfinished transaction.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the database answers a trivial query.
    pub fn is_healthy(&self) -> bool {
        self.conn()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}

/// Formats a timestamp the way it is stored (RFC 3339 text).
pub(crate) fn encode_time(at: OffsetDateTime) -> rusqlite::Result<String> {
    at.format(&Rfc3339)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Parses a stored timestamp in column `index`.
pub(crate) fn decode_time(index: usize, value: String) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::parse(&value, &Rfc3339)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub(crate) fn decode_opt_time(
    index: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<OffsetDateTime>> {
    value.map(|v| decode_time(index, v)).transpose()
}

/// Decodes a JSON list column.
pub(crate) fn decode_list(index: usize, value: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub(crate) fn encode_list(values: &[String]) -> rusqlite::Result<String> {
    serde_json::to_string(values).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Current UTC time; every stored timestamp is UTC.
pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_is_healthy() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn opening_twice_keeps_schema_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homecare.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn times_round_trip_through_text() {
        let at = now();
        let text = encode_time(at).unwrap();
        assert_eq!(decode_time(0, text).unwrap(), at);
    }
}
