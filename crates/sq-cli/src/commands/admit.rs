//! Admit command for issuing a queue token.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Args;

use sq_core::{Priority, ResourceId, ShortCode, SubjectId};
use sq_db::{AdmissionRequest, Booking, SessionRef};

use super::util::{date_or_today, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct AdmitArgs {
    /// Subject (patient, customer) joining the queue.
    #[arg(long)]
    pub subject: String,

    /// Session ID to join.
    #[arg(long, conflicts_with_all = ["code", "date"], required_unless_present = "code")]
    pub session: Option<String>,

    /// Short code of the session to join.
    #[arg(long)]
    pub code: Option<String>,

    /// Date of the session when joining by short code. Defaults to today.
    #[arg(long, requires = "code")]
    pub date: Option<NaiveDate>,

    /// Priority asked for by the caller.
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Urgency established at triage; the higher of this and --priority wins.
    #[arg(long)]
    pub urgency: Option<Priority>,

    /// Resource (practitioner, room) to assign the booking to.
    #[arg(long)]
    pub resource: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &AdmitArgs, config: &Config) -> Result<()> {
    let request = build_request(args)?;
    let mut db = open_database(config)?;

    // Admission by code needs the date's sessions to exist.
    if let SessionRef::DateCode { date, .. } = &request.session {
        db.reconcile_date(*date, &config.schedule)?;
    }

    let booking = match db.admit(&request, &config.token_format()) {
        Ok(booking) => booking,
        Err(err) => bail!("{}: {err}", err.code()),
    };

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&booking)?)?;
    } else {
        write_booking(writer, &booking)?;
    }
    Ok(())
}

fn build_request(args: &AdmitArgs) -> Result<AdmissionRequest> {
    let subject_id = SubjectId::new(args.subject.as_str())?;
    let session = match (&args.session, &args.code) {
        (Some(id), _) => SessionRef::Id(id.trim().to_string()),
        (None, Some(code)) => SessionRef::DateCode {
            date: date_or_today(args.date),
            short_code: ShortCode::new(code.as_str())?,
        },
        (None, None) => bail!("either --session or --code is required"),
    };

    let mut request = AdmissionRequest::new(subject_id, session);
    request.priority_hint = args.priority;
    request.derived_urgency = args.urgency;
    request.resource_id = args
        .resource
        .as_deref()
        .map(ResourceId::new)
        .transpose()?;
    Ok(request)
}

fn write_booking<W: Write>(writer: &mut W, booking: &Booking) -> Result<()> {
    writeln!(
        writer,
        "Admitted {} with token {} ({})",
        booking.subject_id, booking.token_number, booking.priority
    )?;
    writeln!(writer, "Booking: {}", booking.id)?;
    if let Some(resource) = &booking.resource_id {
        writeln!(writer, "Resource: {resource}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sq_db::Database;

    use crate::commands::util::test_support::{config, date, template};

    fn args(subject: &str, code: &str) -> AdmitArgs {
        AdmitArgs {
            subject: subject.to_string(),
            session: None,
            code: Some(code.to_string()),
            date: Some(date("2099-03-02")),
            priority: None,
            urgency: None,
            resource: None,
            json: false,
        }
    }

    #[test]
    fn admit_by_code_reconciles_and_issues_tokens() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), vec![template("Morning", "M", "09:00", "12:00", 2)]);

        let mut output = Vec::new();
        run(&mut output, &args("alice", "M"), &config).unwrap();
        let mut second = args("bob", "M");
        second.priority = Some(Priority::Low);
        second.urgency = Some(Priority::Emergency);
        run(&mut output, &second, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output
            .lines()
            .filter(|line| line.starts_with("Admitted"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "Admitted alice with token T-M001 (normal)",
                "Admitted bob with token T-M002 (emergency)",
            ]
        );

        let err = run(&mut Vec::new(), &args("carol", "M"), &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "SESSION_FULL: session M on 2099-03-02 is full (2 tokens issued)"
        );
    }

    #[test]
    fn admit_reports_duplicate_and_missing_sessions() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), vec![template("Morning", "M", "09:00", "12:00", 5)]);

        run(&mut Vec::new(), &args("alice", "M"), &config).unwrap();
        let err = run(&mut Vec::new(), &args("alice", "M"), &config).unwrap_err();
        assert!(err.to_string().starts_with("DUPLICATE_BOOKING:"));

        let err = run(&mut Vec::new(), &args("alice", "X"), &config).unwrap_err();
        assert!(err.to_string().starts_with("NOT_FOUND:"));
    }

    #[test]
    fn admit_by_session_id_outputs_json() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), vec![template("Morning", "M", "09:00", "12:00", 5)]);
        let session_id = {
            let mut db = Database::open(&config.database_path).unwrap();
            db.reconcile_date(date("2099-03-02"), &config.schedule).unwrap()[0]
                .id
                .clone()
        };

        let mut output = Vec::new();
        let args = AdmitArgs {
            subject: "dave".to_string(),
            session: Some(session_id.clone()),
            code: None,
            date: None,
            priority: Some(Priority::High),
            urgency: None,
            resource: None,
            json: true,
        };
        run(&mut output, &args, &config).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["session_instance_id"], session_id.as_str());
        assert_eq!(value["token_number"], "T-M001");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["status"], "active");
    }

    #[test]
    fn admit_checks_resource() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), vec![template("Morning", "M", "09:00", "12:00", 5)]);

        let mut request = args("alice", "M");
        request.resource = Some("dr-lee".to_string());
        let err = run(&mut Vec::new(), &request, &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "RESOURCE_UNAVAILABLE: resource dr-lee is unavailable: not registered"
        );

        {
            let mut db = Database::open(&config.database_path).unwrap();
            db.upsert_resource(&ResourceId::new("dr-lee").unwrap(), "Dr Lee")
                .unwrap();
        }
        let mut output = Vec::new();
        run(&mut output, &request, &config).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Resource: dr-lee"));
    }

    #[test]
    fn admit_rejects_blank_subject() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), Vec::new());

        let err = run(&mut Vec::new(), &args("  ", "M"), &config).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }
}
