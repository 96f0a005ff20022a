//! Storage layer for session queues.
//!
//! Persists session instances, bookings and resources using `rusqlite`, and
//! hosts the operations that must run inside a transaction: reconciling a
//! date against its templates and admitting a booking.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Each request handler or thread opens its own `Database` on the same file.
//! Writers use `BEGIN IMMEDIATE`, so concurrent admissions queue on SQLite's
//! write lock (bounded by the busy timeout) instead of racing on the counter.
//!
//! # Schema
//!
//! ## Dates and Times
//!
//! Calendar dates are stored as TEXT `YYYY-MM-DD`. Session hours are stored as
//! clock minutes (`0..1440`); a session whose end is at or before its start
//! runs past midnight. Timestamps are RFC 3339 TEXT in UTC with millisecond
//! precision, so lexicographic order matches chronological order.
//!
//! ## Booking Status
//!
//! `bookings.status` holds the current [`BookingStatus`](sq_core::BookingStatus);
//! every change is also appended to `booking_history`, which is never updated
//! or deleted.

mod bookings;
mod resources;
mod sessions;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

pub use bookings::{
    AdmissionError, AdmissionRequest, Booking, ErrorKind, SessionRef, StatusChange,
    TransitionError,
};
pub use resources::{Resource, UnavailabilityRule, UnavailableReason};
pub use sessions::{DaySession, SessionInstance};

/// How long a writer waits for the lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored calendar date could not be parsed.
    #[error("invalid date: {value}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp: {value}")]
    TimestampParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row violates a domain rule.
    #[error("invalid {table} row {id}: {message}")]
    InvalidRow {
        table: &'static str,
        id: String,
        message: String,
    },
    /// A date range ends before it starts.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens a database with a custom busy timeout.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- One row per (date, template short code).
            -- start_minute/end_minute: clock minutes; end <= start wraps past midnight
            -- current_tokens: issued tokens, never decremented
            CREATE TABLE IF NOT EXISTS session_instances (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                name TEXT NOT NULL,
                short_code TEXT NOT NULL,
                start_minute INTEGER NOT NULL,
                end_minute INTEGER NOT NULL,
                max_tokens INTEGER NOT NULL,
                current_tokens INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (date, short_code),
                CHECK (current_tokens >= 0 AND current_tokens <= max_tokens)
            );

            CREATE INDEX IF NOT EXISTS idx_session_instances_date ON session_instances(date);

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                session_instance_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                token_number TEXT NOT NULL,
                token_sequence INTEGER NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                resource_id TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_instance_id) REFERENCES session_instances(id) ON DELETE RESTRICT
            );

            CREATE INDEX IF NOT EXISTS idx_bookings_session ON bookings(session_instance_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_active_subject
                ON bookings(session_instance_id, subject_id) WHERE status = 'active';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_token
                ON bookings(session_instance_id, token_number) WHERE status != 'cancelled';

            -- Append-only status log; from_status is NULL for the admission row
            CREATE TABLE IF NOT EXISTS booking_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_id TEXT NOT NULL,
                from_status TEXT,
                to_status TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                note TEXT,
                FOREIGN KEY (booking_id) REFERENCES bookings(id) ON DELETE RESTRICT
            );

            CREATE INDEX IF NOT EXISTS idx_booking_history_booking ON booking_history(booking_id);

            CREATE TABLE IF NOT EXISTS resources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Inclusive date ranges during which a resource takes no bookings
            CREATE TABLE IF NOT EXISTS resource_unavailability (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                reason TEXT,
                FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_resource_unavailability_resource
                ON resource_unavailability(resource_id);
            ",
        )?;
        Ok(())
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| DbError::DateParse {
        value: value.to_string(),
        source,
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            value: value.to_string(),
            source,
        })
}
