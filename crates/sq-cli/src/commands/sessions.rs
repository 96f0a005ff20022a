//! Sessions command for listing a date's sessions and their queues.
//!
//! `sq sessions` reconciles the date (and the day before it, for sessions that
//! run past midnight) before listing, so the output always reflects the
//! current schedule.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

use sq_db::DaySession;

use super::util::{date_or_today, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct SessionsArgs {
    /// Date to list (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &SessionsArgs, config: &Config) -> Result<()> {
    let date = date_or_today(args.date);
    let mut db = open_database(config)?;
    let sessions = db.sessions_for_date(date, &config.schedule)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&sessions)?)?;
    } else {
        write!(writer, "{}", format_sessions(date, &sessions))?;
    }
    Ok(())
}

/// Format sessions and their bookings for human-readable output.
pub fn format_sessions(date: NaiveDate, sessions: &[DaySession]) -> String {
    let mut output = String::new();

    writeln!(output, "SESSIONS {date}").unwrap();
    writeln!(output).unwrap();

    if sessions.is_empty() {
        writeln!(output, "No sessions scheduled.").unwrap();
        return output;
    }

    for day in sessions {
        let session = &day.session;
        let mut line = format!(
            "{:<6}  {:<16}  {:<11}  {}/{}",
            session.short_code.as_str(),
            session.name,
            session.hours(),
            session.current_tokens,
            session.max_tokens
        );
        if day.carried_over {
            line.push_str("  (from previous day)");
        }
        writeln!(output, "{line}").unwrap();

        for booking in &day.bookings {
            writeln!(
                output,
                "    {:<10}  {:<16}  {:<9}  {}",
                booking.token_number,
                booking.subject_id.as_str(),
                booking.priority.as_str(),
                booking.status
            )
            .unwrap();
        }
    }

    output
}
