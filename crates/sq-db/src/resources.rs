//! Assignable resources (practitioners, rooms) and their blocked dates.

use std::fmt;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use sq_core::ResourceId;

use crate::{Database, DbError, format_date, parse_date};

/// A registered resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub is_active: bool,
    pub unavailability: Vec<UnavailabilityRule>,
}

/// An inclusive date range during which a resource takes no bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailabilityRule {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl UnavailabilityRule {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Why a resource cannot take a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    NotRegistered,
    Inactive,
    Blocked(UnavailabilityRule),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "not registered"),
            Self::Inactive => write!(f, "inactive"),
            Self::Blocked(rule) => {
                write!(f, "unavailable {} to {}", rule.start_date, rule.end_date)?;
                if let Some(reason) = &rule.reason {
                    write!(f, " ({reason})")?;
                }
                Ok(())
            }
        }
    }
}

impl Database {
    /// Registers a resource, or renames it if it already exists.
    pub fn upsert_resource(&mut self, id: &ResourceId, name: &str) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO resources (id, name, is_active) VALUES (?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
            params![id.as_str(), name],
        )?;
        Ok(())
    }

    /// Switches a resource on or off. Returns `false` if it does not exist.
    pub fn set_resource_active(&mut self, id: &ResourceId, active: bool) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "UPDATE resources SET is_active = ? WHERE id = ?",
            params![active, id.as_str()],
        )?;
        Ok(updated > 0)
    }

    /// Blocks a resource for an inclusive date range.
    pub fn add_unavailability(
        &mut self,
        id: &ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<&str>,
    ) -> Result<i64, DbError> {
        if end_date < start_date {
            return Err(DbError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        self.conn.execute(
            "
            INSERT INTO resource_unavailability (resource_id, start_date, end_date, reason)
            VALUES (?, ?, ?, ?)
            ",
            params![
                id.as_str(),
                format_date(start_date),
                format_date(end_date),
                reason
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lists resources ordered by ID, with their blocked ranges.
    pub fn list_resources(&self) -> Result<Vec<Resource>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_active FROM resources ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;
        let mut resources = Vec::new();
        for row in rows {
            let (id, name, is_active) = row?;
            let unavailability = unavailability_for(&self.conn, &id)?;
            let id = ResourceId::new(id.as_str()).map_err(|err| DbError::InvalidRow {
                table: "resources",
                id: id.clone(),
                message: err.to_string(),
            })?;
            resources.push(Resource {
                id,
                name,
                is_active,
                unavailability,
            });
        }
        Ok(resources)
    }
}

/// Returns why `id` cannot take a booking on `date`, or `None` if it can.
pub(crate) fn check_resource(
    conn: &Connection,
    id: &ResourceId,
    date: NaiveDate,
) -> Result<Option<UnavailableReason>, DbError> {
    let is_active: Option<bool> = conn
        .query_row(
            "SELECT is_active FROM resources WHERE id = ?",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match is_active {
        None => return Ok(Some(UnavailableReason::NotRegistered)),
        Some(false) => return Ok(Some(UnavailableReason::Inactive)),
        Some(true) => {}
    }

    let blocked = unavailability_for(conn, id.as_str())?
        .into_iter()
        .find(|rule| rule.covers(date));
    Ok(blocked.map(UnavailableReason::Blocked))
}

fn unavailability_for(
    conn: &Connection,
    resource_id: &str,
) -> Result<Vec<UnavailabilityRule>, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, start_date, end_date, reason
        FROM resource_unavailability
        WHERE resource_id = ?
        ORDER BY start_date ASC, id ASC
        ",
    )?;
    let rows = stmt.query_map([resource_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;
    let mut rules = Vec::new();
    for row in rows {
        let (id, start_date, end_date, reason) = row?;
        rules.push(UnavailabilityRule {
            id,
            start_date: parse_date(&start_date)?,
            end_date: parse_date(&end_date)?,
            reason,
        });
    }
    Ok(rules)
}
