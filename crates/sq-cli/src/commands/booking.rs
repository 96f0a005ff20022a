//! Booking commands for status changes and history.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Subcommand;

use sq_core::BookingStatus;

use super::util::open_database;
use crate::Config;

/// Booking subcommands.
#[derive(Debug, Subcommand)]
pub enum BookingAction {
    /// Cancel an active booking.
    Cancel {
        /// Booking ID.
        id: String,
        /// Note stored with the status change.
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark an active booking as completed.
    Complete {
        /// Booking ID.
        id: String,
        /// Note stored with the status change.
        #[arg(long)]
        note: Option<String>,
    },
    /// Show a booking's status history.
    History {
        /// Booking ID.
        id: String,
    },
}

pub fn run<W: Write>(writer: &mut W, action: &BookingAction, config: &Config) -> Result<()> {
    match action {
        BookingAction::Cancel { id, note } => {
            transition(writer, config, id, BookingStatus::Cancelled, note.as_deref())
        }
        BookingAction::Complete { id, note } => {
            transition(writer, config, id, BookingStatus::Completed, note.as_deref())
        }
        BookingAction::History { id } => history(writer, config, id),
    }
}

fn transition<W: Write>(
    writer: &mut W,
    config: &Config,
    id: &str,
    to: BookingStatus,
    note: Option<&str>,
) -> Result<()> {
    let mut db = open_database(config)?;
    let booking = db.transition_booking(id, to, note)?;
    writeln!(
        writer,
        "Booking {} ({}) is now {}",
        booking.id, booking.token_number, booking.status
    )?;
    Ok(())
}

fn history<W: Write>(writer: &mut W, config: &Config, id: &str) -> Result<()> {
    let db = open_database(config)?;
    let Some(booking) = db.booking(id)? else {
        bail!("booking not found: {id}");
    };

    writeln!(
        writer,
        "{} {} in session {}",
        booking.token_number, booking.subject_id, booking.session_instance_id
    )?;
    for change in db.booking_history(id)? {
        let from = change.from.as_ref().map_or("-", BookingStatus::as_str);
        write!(
            writer,
            "  {}  {} -> {}",
            change.changed_at.format("%Y-%m-%d %H:%M:%S"),
            from,
            change.to
        )?;
        if let Some(note) = &change.note {
            write!(writer, "  {note}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
