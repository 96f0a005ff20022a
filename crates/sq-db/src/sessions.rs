//! Session instances: reconciliation, cross-midnight carry-over and the
//! per-date read surface.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use uuid::Uuid;

use sq_core::{
    DayPlan, MinuteSpan, RejectReason, ScheduleConfig, ShortCode, format_minutes, plan_day,
};

use crate::bookings::{Booking, bookings_for_session};
use crate::{Database, DbError, format_date, format_timestamp, parse_date};

/// A concrete, dated occurrence of a day template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInstance {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub short_code: ShortCode,
    /// Clock minute the session opens.
    pub start_minute: u32,
    /// Clock minute the session closes; at or before `start_minute` when it
    /// runs past midnight.
    pub end_minute: u32,
    pub max_tokens: u32,
    pub current_tokens: u32,
    pub is_active: bool,
}

impl SessionInstance {
    pub const fn span(&self) -> MinuteSpan {
        MinuteSpan::from_clock(self.start_minute, self.end_minute)
    }

    /// Whether the session extends into the following date.
    pub const fn crosses_midnight(&self) -> bool {
        self.span().crosses_midnight()
    }

    pub const fn is_full(&self) -> bool {
        self.current_tokens >= self.max_tokens
    }

    pub fn hours(&self) -> String {
        format!(
            "{}-{}",
            format_minutes(self.start_minute),
            format_minutes(self.end_minute)
        )
    }
}

/// A session as returned by [`Database::sessions_for_date`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySession {
    #[serde(flatten)]
    pub session: SessionInstance,
    /// Bookings in creation order.
    pub bookings: Vec<Booking>,
    /// Set when the session started on the previous date.
    pub carried_over: bool,
}

impl Database {
    /// Synchronizes the stored sessions for `date` with the schedule.
    ///
    /// Accepted templates are inserted or updated in place; the issued token
    /// counter is never touched. Sessions that are no longer planned are
    /// deleted, or deactivated when they already hold bookings. Repeated calls
    /// with an unchanged schedule leave the store unchanged.
    ///
    /// Returns the active sessions for `date` ordered by start time.
    pub fn reconcile_date(
        &mut self,
        date: NaiveDate,
        config: &ScheduleConfig,
    ) -> Result<Vec<SessionInstance>, DbError> {
        let plan = plan_day(date, config);
        log_rejections(&plan);

        let created_at = format_timestamp(Utc::now());
        let day = format_date(date);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut upsert = tx.prepare(
                "
                INSERT INTO session_instances
                (id, date, name, short_code, start_minute, end_minute, max_tokens, current_tokens, is_active, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, 0, 1, ?)
                ON CONFLICT(date, short_code) DO UPDATE SET
                    name = excluded.name,
                    start_minute = excluded.start_minute,
                    end_minute = excluded.end_minute,
                    max_tokens = MAX(excluded.max_tokens, session_instances.current_tokens),
                    is_active = 1
                ",
            )?;
            for planned in &plan.accepted {
                upsert.execute(params![
                    session_id(date, &planned.short_code),
                    day,
                    planned.name,
                    planned.short_code.as_str(),
                    planned.span.start(),
                    planned.span.clock_end(),
                    planned.max_tokens,
                    created_at,
                ])?;
            }
        }

        let keep: HashSet<&str> = plan
            .accepted
            .iter()
            .map(|planned| planned.short_code.as_str())
            .collect();
        let retired = retire_unplanned(&tx, &day, &keep)?;

        let sessions = sessions_on(&tx, date)?;
        tx.commit()?;

        tracing::debug!(
            %date,
            open = plan.is_open(),
            accepted = plan.accepted.len(),
            rejected = plan.rejected.len(),
            retired,
            "reconciled date"
        );
        Ok(sessions)
    }

    /// Sessions from the day before `date` that run past midnight into it.
    ///
    /// Reconciles the previous date first, so its sessions exist.
    pub fn carried_over_sessions(
        &mut self,
        date: NaiveDate,
        config: &ScheduleConfig,
    ) -> Result<Vec<SessionInstance>, DbError> {
        let Some(previous) = date.pred_opt() else {
            return Ok(Vec::new());
        };
        let sessions = self.reconcile_date(previous, config)?;
        Ok(sessions
            .into_iter()
            .filter(SessionInstance::crosses_midnight)
            .collect())
    }

    /// All sessions relevant to `date` with their bookings.
    ///
    /// Sessions carried over from the previous night come first, then the
    /// date's own sessions in start order.
    pub fn sessions_for_date(
        &mut self,
        date: NaiveDate,
        config: &ScheduleConfig,
    ) -> Result<Vec<DaySession>, DbError> {
        let carried = self.carried_over_sessions(date, config)?;
        let own = self.reconcile_date(date, config)?;

        carried
            .into_iter()
            .map(|session| (session, true))
            .chain(own.into_iter().map(|session| (session, false)))
            .map(|(session, carried_over)| {
                let bookings = bookings_for_session(&self.conn, &session.id)?;
                Ok(DaySession {
                    session,
                    bookings,
                    carried_over,
                })
            })
            .collect()
    }

    /// Looks up a session by ID, active or not.
    pub fn session_by_id(&self, id: &str) -> Result<Option<SessionInstance>, DbError> {
        load_session(&self.conn, id)
    }

    /// Looks up a session by date and short code, active or not.
    pub fn session_by_code(
        &self,
        date: NaiveDate,
        short_code: &ShortCode,
    ) -> Result<Option<SessionInstance>, DbError> {
        load_session_by_code(&self.conn, date, short_code)
    }

    /// Active sessions stored for `date`, without reconciling.
    pub fn stored_sessions(&self, date: NaiveDate) -> Result<Vec<SessionInstance>, DbError> {
        sessions_on(&self.conn, date)
    }
}

/// Stable session ID for a date and short code.
fn session_id(date: NaiveDate, short_code: &ShortCode) -> String {
    let content = format!("session|{}|{}", format_date(date), short_code);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

fn log_rejections(plan: &DayPlan) {
    for rejection in &plan.rejected {
        if rejection.reason == RejectReason::Inactive {
            tracing::debug!(
                date = %plan.date,
                short_code = %rejection.short_code,
                "skipping inactive template"
            );
        } else {
            tracing::warn!(
                date = %plan.date,
                short_code = %rejection.short_code,
                name = %rejection.name,
                hours = %rejection.span,
                reason = %rejection.reason,
                "template excluded from schedule"
            );
        }
    }
}

/// Removes sessions on `day` whose short code is not in `keep`.
///
/// Sessions holding bookings are deactivated instead, since bookings are
/// never deleted.
fn retire_unplanned(conn: &Connection, day: &str, keep: &HashSet<&str>) -> Result<usize, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, short_code FROM session_instances WHERE date = ? AND is_active = 1",
    )?;
    let rows = stmt.query_map([day], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut stale = Vec::new();
    for row in rows {
        let (id, short_code) = row?;
        if !keep.contains(short_code.as_str()) {
            stale.push((id, short_code));
        }
    }

    for (id, short_code) in &stale {
        let deleted = conn.execute(
            "
            DELETE FROM session_instances
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM bookings WHERE session_instance_id = session_instances.id)
            ",
            [id],
        )?;
        if deleted == 0 {
            conn.execute(
                "UPDATE session_instances SET is_active = 0 WHERE id = ?",
                [id],
            )?;
            tracing::debug!(%day, %short_code, "deactivated session with bookings");
        } else {
            tracing::debug!(%day, %short_code, "removed session");
        }
    }
    Ok(stale.len())
}

const SESSION_COLUMNS: &str = "id, date, name, short_code, start_minute, end_minute, max_tokens, current_tokens, is_active";

#[derive(Debug)]
struct SessionRow {
    id: String,
    date: String,
    name: String,
    short_code: String,
    start_minute: u32,
    end_minute: u32,
    max_tokens: u32,
    current_tokens: u32,
    is_active: bool,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            name: row.get(2)?,
            short_code: row.get(3)?,
            start_minute: row.get(4)?,
            end_minute: row.get(5)?,
            max_tokens: row.get(6)?,
            current_tokens: row.get(7)?,
            is_active: row.get(8)?,
        })
    }

    fn into_session(self) -> Result<SessionInstance, DbError> {
        let short_code = ShortCode::new(self.short_code).map_err(|err| DbError::InvalidRow {
            table: "session_instances",
            id: self.id.clone(),
            message: err.to_string(),
        })?;
        Ok(SessionInstance {
            date: parse_date(&self.date)?,
            id: self.id,
            name: self.name,
            short_code,
            start_minute: self.start_minute,
            end_minute: self.end_minute,
            max_tokens: self.max_tokens,
            current_tokens: self.current_tokens,
            is_active: self.is_active,
        })
    }
}

fn sessions_on(conn: &Connection, date: NaiveDate) -> Result<Vec<SessionInstance>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {SESSION_COLUMNS}
        FROM session_instances
        WHERE date = ? AND is_active = 1
        ORDER BY start_minute ASC, short_code ASC
        "
    ))?;
    let rows = stmt.query_map([format_date(date)], SessionRow::from_row)?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?.into_session()?);
    }
    Ok(sessions)
}

pub(crate) fn load_session(
    conn: &Connection,
    id: &str,
) -> Result<Option<SessionInstance>, DbError> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM session_instances WHERE id = ?"),
        [id],
        SessionRow::from_row,
    )
    .optional()?
    .map(SessionRow::into_session)
    .transpose()
}

pub(crate) fn load_session_by_code(
    conn: &Connection,
    date: NaiveDate,
    short_code: &ShortCode,
) -> Result<Option<SessionInstance>, DbError> {
    conn.query_row(
        &format!(
            "SELECT {SESSION_COLUMNS} FROM session_instances WHERE date = ? AND short_code = ?"
        ),
        params![format_date(date), short_code.as_str()],
        SessionRow::from_row,
    )
    .optional()?
    .map(SessionRow::into_session)
    .transpose()
}
