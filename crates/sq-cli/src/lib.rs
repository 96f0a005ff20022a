//! Session queue CLI library.
//!
//! This crate provides the `sq` command-line interface over the scheduler
//! and admission engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
