//! CLI subcommand implementations.

pub mod admit;
pub mod booking;
pub mod plan;
pub mod reconcile;
pub mod resource;
pub mod sessions;
pub mod util;
