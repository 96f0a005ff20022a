//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::admit::AdmitArgs;
use crate::commands::booking::BookingAction;
use crate::commands::plan::PlanArgs;
use crate::commands::reconcile::ReconcileArgs;
use crate::commands::resource::ResourceAction;
use crate::commands::sessions::SessionsArgs;

/// Session scheduler and token queue.
///
/// Turns day templates into dated sessions and hands out ordered queue
/// tokens for them.
#[derive(Debug, Parser)]
#[command(name = "sq", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List a date's sessions and their queues.
    Sessions(SessionsArgs),

    /// Sync stored sessions with the schedule for one or more dates.
    Reconcile(ReconcileArgs),

    /// Preview which templates a date accepts, without writing anything.
    Plan(PlanArgs),

    /// Issue a queue token to a subject.
    Admit(AdmitArgs),

    /// Change a booking's status or show its history.
    #[command(subcommand)]
    Booking(BookingAction),

    /// Manage resources and their blocked dates.
    #[command(subcommand)]
    Resource(ResourceAction),
}
