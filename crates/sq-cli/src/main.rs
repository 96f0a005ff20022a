use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sq_cli::commands::{admit, booking, plan, reconcile, resource, sessions};
use sq_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();
    match command {
        Commands::Sessions(args) => sessions::run(&mut stdout, args, &config)?,
        Commands::Reconcile(args) => reconcile::run(&mut stdout, args, &config)?,
        Commands::Plan(args) => plan::run(&mut stdout, args, &config)?,
        Commands::Admit(args) => admit::run(&mut stdout, args, &config)?,
        Commands::Booking(action) => booking::run(&mut stdout, action, &config)?,
        Commands::Resource(action) => resource::run(&mut stdout, action, &config)?,
    }

    Ok(())
}
