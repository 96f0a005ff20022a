//! Plan command for previewing which templates a date would accept.
//!
//! This is a dry run: nothing is written to the database.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use clap::Args;

use sq_core::{DayPlan, plan_day};

use super::util::date_or_today;
use crate::Config;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Date to plan (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

pub fn run<W: Write>(writer: &mut W, args: &PlanArgs, config: &Config) -> Result<()> {
    let plan = plan_day(date_or_today(args.date), &config.schedule);
    write!(writer, "{}", format_plan(&plan))?;
    Ok(())
}

/// Format a day plan for human-readable output.
pub fn format_plan(plan: &DayPlan) -> String {
    let mut output = String::new();

    writeln!(output, "PLAN {} ({})", plan.date, plan.date.weekday()).unwrap();

    let Some(hours) = plan.business_hours else {
        writeln!(output, "Closed.").unwrap();
        return output;
    };
    writeln!(output, "Business hours: {hours}").unwrap();

    writeln!(output).unwrap();
    writeln!(output, "Accepted:").unwrap();
    if plan.accepted.is_empty() {
        writeln!(output, "  (none)").unwrap();
    }
    for session in &plan.accepted {
        writeln!(
            output,
            "  {:<6}  {:<16}  {:<11}  max {}",
            session.short_code.as_str(),
            session.name,
            session.span.to_string(),
            session.max_tokens
        )
        .unwrap();
    }

    if !plan.rejected.is_empty() {
        writeln!(output, "Rejected:").unwrap();
        for rejection in &plan.rejected {
            writeln!(
                output,
                "  {:<6}  {:<16}  {:<11}  {}",
                rejection.short_code.as_str(),
                rejection.name,
                rejection.span.to_string(),
                rejection.reason
            )
            .unwrap();
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use sq_core::{LunchBreak, WeeklySchedule};

    use crate::commands::util::test_support::{config, date, template};

    #[test]
    fn plan_explains_rejections() {
        let temp = tempfile::tempdir().unwrap();
        let mut inactive = template("Retired", "R", "15:00", "16:00", 5);
        inactive.is_active = false;
        let mut config = config(
            temp.path(),
            vec![
                template("Morning", "M", "09:00", "12:00", 20),
                template("Midday", "D", "12:30", "13:30", 10),
                template("Overlap", "O", "11:00", "12:00", 10),
                template("Afternoon", "A", "14:00", "16:00", 10),
                template("Late", "L", "16:30", "18:00", 10),
                template("Night", "N", "23:00", "01:00", 10),
                inactive,
            ],
        );
        config.schedule.lunch_break = Some(LunchBreak {
            start: "13:00".to_string(),
            end: "14:00".to_string(),
        });

        let mut output = Vec::new();
        run(
            &mut output,
            &PlanArgs {
                date: Some(date("2099-03-02")),
            },
            &config,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        PLAN 2099-03-02 (Mon)
        Business hours: 09:00-17:00

        Accepted:
          M       Morning           09:00-12:00  max 20
          A       Afternoon         14:00-16:00  max 10
        Rejected:
          O       Overlap           11:00-12:00  overlaps M
          D       Midday            12:30-13:30  intersects lunch break
          R       Retired           15:00-16:00  inactive
          L       Late              16:30-18:00  outside business hours
          N       Night             23:00-01:00  crosses midnight but business hours do not
        ");
    }

    #[test]
    fn plan_reports_closed_day() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = config(temp.path(), vec![template("Morning", "M", "09:00", "12:00", 20)]);
        config.schedule.weekly = WeeklySchedule::default();

        let mut output = Vec::new();
        run(
            &mut output,
            &PlanArgs {
                date: Some(date("2099-03-02")),
            },
            &config,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        PLAN 2099-03-02 (Mon)
        Closed.
        ");
    }
}
