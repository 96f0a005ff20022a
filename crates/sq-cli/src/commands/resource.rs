//! Resource commands for managing practitioners, rooms and their blocked dates.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Subcommand;

use sq_core::ResourceId;
use sq_db::Resource;

use super::util::open_database;
use crate::Config;

/// Resource subcommands.
#[derive(Debug, Subcommand)]
pub enum ResourceAction {
    /// Register a resource, or rename an existing one.
    Add {
        /// Resource ID.
        id: String,
        /// Display name.
        name: String,
    },
    /// Stop a resource from taking new bookings.
    Deactivate {
        /// Resource ID.
        id: String,
    },
    /// Block a resource for an inclusive date range.
    Block {
        /// Resource ID.
        id: String,
        /// First blocked date (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,
        /// Last blocked date (YYYY-MM-DD).
        #[arg(long)]
        to: NaiveDate,
        /// Why the resource is unavailable.
        #[arg(long)]
        reason: Option<String>,
    },
    /// List resources and their blocked dates.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn run<W: Write>(writer: &mut W, action: &ResourceAction, config: &Config) -> Result<()> {
    let mut db = open_database(config)?;
    match action {
        ResourceAction::Add { id, name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("name cannot be empty");
            }
            let id = ResourceId::new(id.as_str())?;
            db.upsert_resource(&id, name)?;
            writeln!(writer, "Saved resource {id} ({name})")?;
        }
        ResourceAction::Deactivate { id } => {
            let id = ResourceId::new(id.as_str())?;
            if !db.set_resource_active(&id, false)? {
                bail!("resource not found: {id}");
            }
            writeln!(writer, "Deactivated resource {id}")?;
        }
        ResourceAction::Block {
            id,
            from,
            to,
            reason,
        } => {
            let id = ResourceId::new(id.as_str())?;
            if !db.list_resources()?.iter().any(|resource| resource.id == id) {
                bail!("resource not found: {id}");
            }
            db.add_unavailability(&id, *from, *to, reason.as_deref())?;
            writeln!(writer, "Blocked resource {id} from {from} to {to}")?;
        }
        ResourceAction::List { json } => {
            let resources = db.list_resources()?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&resources)?)?;
            } else {
                write!(writer, "{}", format_resources(&resources))?;
            }
        }
    }
    Ok(())
}

/// Format resources for human-readable output.
pub fn format_resources(resources: &[Resource]) -> String {
    let mut output = String::new();

    if resources.is_empty() {
        writeln!(output, "No resources registered.").unwrap();
        return output;
    }

    for resource in resources {
        let state = if resource.is_active { "active" } else { "inactive" };
        writeln!(
            output,
            "{:<12}  {:<20}  {}",
            resource.id.as_str(),
            resource.name,
            state
        )
        .unwrap();
        for rule in &resource.unavailability {
            write!(output, "    blocked {} to {}", rule.start_date, rule.end_date).unwrap();
            if let Some(reason) = &rule.reason {
                write!(output, " ({reason})").unwrap();
            }
            writeln!(output).unwrap();
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use crate::commands::util::test_support::config;

    #[test]
    fn add_block_and_list() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), Vec::new());

        let mut output = Vec::new();
        for action in [
            ResourceAction::Add {
                id: "dr-lee".to_string(),
                name: "Dr Lee".to_string(),
            },
            ResourceAction::Add {
                id: "room-2".to_string(),
                name: "Room 2".to_string(),
            },
            ResourceAction::Block {
                id: "dr-lee".to_string(),
                from: "2099-03-10".parse().unwrap(),
                to: "2099-03-12".parse().unwrap(),
                reason: Some("conference".to_string()),
            },
            ResourceAction::Deactivate {
                id: "room-2".to_string(),
            },
            ResourceAction::List { json: false },
        ] {
            run(&mut output, &action, &config).unwrap();
        }

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Saved resource dr-lee (Dr Lee)
        Saved resource room-2 (Room 2)
        Blocked resource dr-lee from 2099-03-10 to 2099-03-12
        Deactivated resource room-2
        dr-lee        Dr Lee                active
            blocked 2099-03-10 to 2099-03-12 (conference)
        room-2        Room 2                inactive
        ");
    }

    #[test]
    fn block_rejects_unknown_resource_and_inverted_range() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), Vec::new());

        let block = |id: &str, from: &str, to: &str| ResourceAction::Block {
            id: id.to_string(),
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            reason: None,
        };

        let err = run(&mut Vec::new(), &block("ghost", "2099-03-10", "2099-03-10"), &config)
            .unwrap_err();
        assert_eq!(err.to_string(), "resource not found: ghost");

        run(
            &mut Vec::new(),
            &ResourceAction::Add {
                id: "dr-lee".to_string(),
                name: "Dr Lee".to_string(),
            },
            &config,
        )
        .unwrap();
        let err = run(&mut Vec::new(), &block("dr-lee", "2099-03-12", "2099-03-10"), &config)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid date range: 2099-03-12 is after 2099-03-10"
        );
    }

    #[test]
    fn list_when_empty() {
        let temp = tempfile::tempdir().unwrap();
        let config = config(temp.path(), Vec::new());

        let mut output = Vec::new();
        run(&mut output, &ResourceAction::List { json: false }, &config).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No resources registered.\n");
    }
}
