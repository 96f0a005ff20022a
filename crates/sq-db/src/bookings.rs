//! Booking admission, token allocation and status transitions.
//!
//! # Admission
//!
//! [`Database::admit`] runs every check and every write inside one
//! `BEGIN IMMEDIATE` transaction. SQLite grants the write lock before the
//! first statement, so the read of the highest issued token and the counter
//! increment cannot interleave with another admission. Any error drops the
//! transaction, which rolls it back: a token is never issued without the
//! counter moving, and the counter never moves without a booking.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the session exists and is active
//! 2. the session date is not in the past
//! 3. the session has capacity left
//! 4. the subject holds no active booking in the session
//! 5. the named resource is registered, active and not blocked on the date

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use sq_core::{BookingStatus, Priority, ResourceId, ShortCode, SubjectId, TokenFormat, next_sequence};

use crate::resources::{UnavailableReason, check_resource};
use crate::sessions::{SessionInstance, load_session, load_session_by_code};
use crate::{Database, DbError, format_timestamp, parse_timestamp};

/// A queue booking within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: String,
    pub session_instance_id: String,
    pub subject_id: SubjectId,
    pub token_number: String,
    pub token_sequence: u32,
    pub priority: Priority,
    pub status: BookingStatus,
    pub resource_id: Option<ResourceId>,
    pub created_at: DateTime<Utc>,
}

/// One entry of a booking's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// `None` for the admission entry.
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub changed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// How an admission request names its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRef {
    Id(String),
    DateCode {
        date: NaiveDate,
        short_code: ShortCode,
    },
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::DateCode { date, short_code } => write!(f, "{short_code} on {date}"),
        }
    }
}

/// A request to join a session's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub subject_id: SubjectId,
    pub session: SessionRef,
    /// Priority asked for by the caller.
    pub priority_hint: Option<Priority>,
    /// Urgency established elsewhere (e.g. at triage).
    pub derived_urgency: Option<Priority>,
    /// Practitioner or other resource the booking is assigned to.
    pub resource_id: Option<ResourceId>,
}

impl AdmissionRequest {
    pub const fn new(subject_id: SubjectId, session: SessionRef) -> Self {
        Self {
            subject_id,
            session,
            priority_hint: None,
            derived_urgency: None,
            resource_id: None,
        }
    }
}

/// Broad classes of failure, for callers deciding how to respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Internal,
}

/// Why an admission was refused.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("session not found or inactive: {session}")]
    NotFound { session: String },

    #[error("session {short_code} on {date} is in the past")]
    PastDate {
        short_code: ShortCode,
        date: NaiveDate,
    },

    #[error("session {short_code} on {date} is full ({max_tokens} tokens issued)")]
    SessionFull {
        short_code: ShortCode,
        date: NaiveDate,
        max_tokens: u32,
    },

    #[error("subject {} already holds token {} in this session", .existing.subject_id, .existing.token_number)]
    DuplicateBooking { existing: Box<Booking> },

    #[error("resource {resource_id} is unavailable: {reason}")]
    ResourceUnavailable {
        resource_id: ResourceId,
        reason: UnavailableReason,
    },

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl From<rusqlite::Error> for AdmissionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(err))
    }
}

impl AdmissionError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PastDate { .. } => ErrorKind::Validation,
            Self::SessionFull { .. }
            | Self::DuplicateBooking { .. }
            | Self::ResourceUnavailable { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Stable reason code for callers and logs.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PastDate { .. } => "PAST_DATE",
            Self::SessionFull { .. } => "SESSION_FULL",
            Self::DuplicateBooking { .. } => "DUPLICATE_BOOKING",
            Self::ResourceUnavailable { .. } => "RESOURCE_UNAVAILABLE",
            Self::Storage(_) => "INTERNAL",
        }
    }
}

/// Why a status change was refused.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("booking not found: {0}")]
    NotFound(String),

    #[error("booking {id} is already {status}")]
    AlreadyTerminal { id: String, status: BookingStatus },

    #[error("bookings cannot be moved back to {0}")]
    InvalidTarget(BookingStatus),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl From<rusqlite::Error> for TransitionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(err))
    }
}

impl Database {
    /// Admits a booking, treating the local calendar date as today.
    pub fn admit(
        &mut self,
        request: &AdmissionRequest,
        tokens: &TokenFormat,
    ) -> Result<Booking, AdmissionError> {
        self.admit_on(request, tokens, Local::now().date_naive())
    }

    /// Admits a booking as of `today`.
    ///
    /// See the [module documentation](self) for the order of checks.
    pub fn admit_on(
        &mut self,
        request: &AdmissionRequest,
        tokens: &TokenFormat,
        today: NaiveDate,
    ) -> Result<Booking, AdmissionError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = admit_in(&tx, request, tokens, today);
        match result {
            Ok(booking) => {
                tx.commit()?;
                tracing::info!(
                    booking_id = %booking.id,
                    session_id = %booking.session_instance_id,
                    subject_id = %booking.subject_id,
                    token = %booking.token_number,
                    priority = %booking.priority,
                    "admitted booking"
                );
                Ok(booking)
            }
            Err(err) => {
                if err.kind() == ErrorKind::Internal {
                    tracing::error!(session = %request.session, error = %err, "admission failed");
                } else {
                    tracing::warn!(
                        session = %request.session,
                        subject_id = %request.subject_id,
                        code = err.code(),
                        "admission refused"
                    );
                }
                Err(err)
            }
        }
    }

    /// Marks an active booking as completed.
    pub fn complete_booking(
        &mut self,
        booking_id: &str,
        note: Option<&str>,
    ) -> Result<Booking, TransitionError> {
        self.transition_booking(booking_id, BookingStatus::Completed, note)
    }

    /// Cancels an active booking. Its token is not reissued to anyone else
    /// while a later token exists.
    pub fn cancel_booking(
        &mut self,
        booking_id: &str,
        note: Option<&str>,
    ) -> Result<Booking, TransitionError> {
        self.transition_booking(booking_id, BookingStatus::Cancelled, note)
    }

    /// Moves an active booking to a terminal status and records the change.
    pub fn transition_booking(
        &mut self,
        booking_id: &str,
        to: BookingStatus,
        note: Option<&str>,
    ) -> Result<Booking, TransitionError> {
        if !to.is_terminal() {
            return Err(TransitionError::InvalidTarget(to));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut booking) = load_booking(&tx, booking_id)? else {
            return Err(TransitionError::NotFound(booking_id.to_string()));
        };
        if booking.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: booking.id,
                status: booking.status,
            });
        }

        let now = Utc::now();
        tx.execute(
            "UPDATE bookings SET status = ? WHERE id = ?",
            params![to.as_str(), booking.id],
        )?;
        append_history(&tx, &booking.id, Some(booking.status), to, now, note)?;
        tx.commit()?;

        tracing::info!(booking_id = %booking.id, from = %booking.status, %to, "booking status changed");
        booking.status = to;
        Ok(booking)
    }

    /// Looks up a booking by ID.
    pub fn booking(&self, booking_id: &str) -> Result<Option<Booking>, DbError> {
        load_booking(&self.conn, booking_id)
    }

    /// Bookings for a session in creation order.
    pub fn session_bookings(&self, session_id: &str) -> Result<Vec<Booking>, DbError> {
        bookings_for_session(&self.conn, session_id)
    }

    /// Status history for a booking, oldest first.
    pub fn booking_history(&self, booking_id: &str) -> Result<Vec<StatusChange>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT from_status, to_status, changed_at, note
            FROM booking_history
            WHERE booking_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([booking_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut changes = Vec::new();
        for row in rows {
            let (from, to, changed_at, note) = row?;
            changes.push(StatusChange {
                from: from
                    .map(|status| parse_status(booking_id, &status))
                    .transpose()?,
                to: parse_status(booking_id, &to)?,
                changed_at: parse_timestamp(&changed_at)?,
                note,
            });
        }
        Ok(changes)
    }
}

fn admit_in(
    conn: &Connection,
    request: &AdmissionRequest,
    tokens: &TokenFormat,
    today: NaiveDate,
) -> Result<Booking, AdmissionError> {
    let session = match &request.session {
        SessionRef::Id(id) => load_session(conn, id)?,
        SessionRef::DateCode { date, short_code } => load_session_by_code(conn, *date, short_code)?,
    };
    let Some(session) = session.filter(|session| session.is_active) else {
        return Err(AdmissionError::NotFound {
            session: request.session.to_string(),
        });
    };

    if session.date < today {
        return Err(AdmissionError::PastDate {
            short_code: session.short_code,
            date: session.date,
        });
    }

    if session.is_full() {
        return Err(AdmissionError::SessionFull {
            short_code: session.short_code,
            date: session.date,
            max_tokens: session.max_tokens,
        });
    }

    if let Some(existing) = active_booking_for(conn, &session.id, &request.subject_id)? {
        return Err(AdmissionError::DuplicateBooking {
            existing: Box::new(existing),
        });
    }

    if let Some(resource_id) = &request.resource_id {
        if let Some(reason) = check_resource(conn, resource_id, session.date)? {
            return Err(AdmissionError::ResourceUnavailable {
                resource_id: resource_id.clone(),
                reason,
            });
        }
    }

    let (token_number, token_sequence) = next_token(conn, &session, tokens)?;
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        session_instance_id: session.id.clone(),
        subject_id: request.subject_id.clone(),
        token_number,
        token_sequence,
        priority: Priority::escalate(request.priority_hint, request.derived_urgency),
        status: BookingStatus::Active,
        resource_id: request.resource_id.clone(),
        created_at: Utc::now(),
    };

    conn.execute(
        "
        INSERT INTO bookings
        (id, session_instance_id, subject_id, token_number, token_sequence, priority, status, resource_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            booking.id,
            booking.session_instance_id,
            booking.subject_id.as_str(),
            booking.token_number,
            booking.token_sequence,
            booking.priority.as_str(),
            booking.status.as_str(),
            booking.resource_id.as_ref().map(ResourceId::as_str),
            format_timestamp(booking.created_at),
        ],
    )?;
    append_history(
        conn,
        &booking.id,
        None,
        BookingStatus::Active,
        booking.created_at,
        None,
    )?;

    let claimed = conn.execute(
        "
        UPDATE session_instances
        SET current_tokens = current_tokens + 1
        WHERE id = ? AND current_tokens < max_tokens
        ",
        [&session.id],
    )?;
    if claimed != 1 {
        return Err(AdmissionError::SessionFull {
            short_code: session.short_code,
            date: session.date,
            max_tokens: session.max_tokens,
        });
    }

    Ok(booking)
}

/// Allocates the next token for `session`.
///
/// Must run inside the admission transaction. Cancelled bookings do not
/// count, so the highest live sequence plus one is always free.
fn next_token(
    conn: &Connection,
    session: &SessionInstance,
    tokens: &TokenFormat,
) -> Result<(String, u32), DbError> {
    let highest: Option<u32> = conn.query_row(
        "
        SELECT MAX(token_sequence)
        FROM bookings
        WHERE session_instance_id = ? AND status != 'cancelled'
        ",
        [&session.id],
        |row| row.get(0),
    )?;
    let sequence = next_sequence(highest);
    let token = tokens.render(&session.short_code, sequence);
    tracing::debug!(session_id = %session.id, %token, "allocated token");
    Ok((token, sequence))
}

fn append_history(
    conn: &Connection,
    booking_id: &str,
    from: Option<BookingStatus>,
    to: BookingStatus,
    at: DateTime<Utc>,
    note: Option<&str>,
) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO booking_history (booking_id, from_status, to_status, changed_at, note)
        VALUES (?, ?, ?, ?, ?)
        ",
        params![
            booking_id,
            from.map(|status| status.as_str()),
            to.as_str(),
            format_timestamp(at),
            note,
        ],
    )?;
    Ok(())
}

const BOOKING_COLUMNS: &str = "id, session_instance_id, subject_id, token_number, token_sequence, priority, status, resource_id, created_at";

#[derive(Debug)]
struct BookingRow {
    id: String,
    session_instance_id: String,
    subject_id: String,
    token_number: String,
    token_sequence: u32,
    priority: String,
    status: String,
    resource_id: Option<String>,
    created_at: String,
}

impl BookingRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_instance_id: row.get(1)?,
            subject_id: row.get(2)?,
            token_number: row.get(3)?,
            token_sequence: row.get(4)?,
            priority: row.get(5)?,
            status: row.get(6)?,
            resource_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_booking(self) -> Result<Booking, DbError> {
        let invalid = |message: String| DbError::InvalidRow {
            table: "bookings",
            id: self.id.clone(),
            message,
        };
        let subject_id = SubjectId::new(self.subject_id.as_str()).map_err(|e| invalid(e.to_string()))?;
        let priority = self
            .priority
            .parse::<Priority>()
            .map_err(|e| invalid(e.to_string()))?;
        let resource_id = self
            .resource_id
            .as_deref()
            .map(ResourceId::new)
            .transpose()
            .map_err(|e| invalid(e.to_string()))?;
        let status = parse_status(&self.id, &self.status)?;
        let created_at = parse_timestamp(&self.created_at)?;
        Ok(Booking {
            id: self.id,
            session_instance_id: self.session_instance_id,
            subject_id,
            token_number: self.token_number,
            token_sequence: self.token_sequence,
            priority,
            status,
            resource_id,
            created_at,
        })
    }
}

fn parse_status(booking_id: &str, value: &str) -> Result<BookingStatus, DbError> {
    value.parse().map_err(|err: sq_core::ValidationError| DbError::InvalidRow {
        table: "bookings",
        id: booking_id.to_string(),
        message: err.to_string(),
    })
}

fn load_booking(conn: &Connection, booking_id: &str) -> Result<Option<Booking>, DbError> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"),
        [booking_id],
        BookingRow::from_row,
    )
    .optional()?
    .map(BookingRow::into_booking)
    .transpose()
}

fn active_booking_for(
    conn: &Connection,
    session_id: &str,
    subject_id: &SubjectId,
) -> Result<Option<Booking>, DbError> {
    conn.query_row(
        &format!(
            "
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE session_instance_id = ? AND subject_id = ? AND status = 'active'
            "
        ),
        params![session_id, subject_id.as_str()],
        BookingRow::from_row,
    )
    .optional()?
    .map(BookingRow::into_booking)
    .transpose()
}

pub(crate) fn bookings_for_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<Booking>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {BOOKING_COLUMNS}
        FROM bookings
        WHERE session_instance_id = ?
        ORDER BY rowid ASC
        "
    ))?;
    let rows = stmt.query_map([session_id], BookingRow::from_row)?;
    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(row?.into_booking()?);
    }
    Ok(bookings)
}
