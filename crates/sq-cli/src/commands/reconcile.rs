//! Reconcile command for syncing stored sessions with the schedule.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{Days, NaiveDate};
use clap::Args;

use super::util::{date_or_today, open_database};
use crate::Config;

/// Longest range a single run will reconcile.
const MAX_DAYS: u32 = 366;

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// First date to reconcile (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Number of consecutive dates to reconcile.
    #[arg(long, default_value_t = 1)]
    pub days: u32,
}

pub fn run<W: Write>(writer: &mut W, args: &ReconcileArgs, config: &Config) -> Result<()> {
    if args.days == 0 || args.days > MAX_DAYS {
        bail!("--days must be between 1 and {MAX_DAYS}");
    }

    let first = date_or_today(args.date);
    let mut db = open_database(config)?;

    for offset in 0..args.days {
        let Some(date) = first.checked_add_days(Days::new(u64::from(offset))) else {
            bail!("date out of range: {first} + {offset} days");
        };
        let sessions = db.reconcile_date(date, &config.schedule)?;
        if sessions.is_empty() {
            writeln!(writer, "{date}  no sessions")?;
            continue;
        }
        let codes: Vec<String> = sessions
            .iter()
            .map(|session| format!("{} {}", session.short_code, session.hours()))
            .collect();
        writeln!(writer, "{date}  {}", codes.join(", "))?;
    }

    Ok(())
}
