//! Chirpscope CLI - review playback harness
//!
//! Command-line front end for the review engine.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chirpscope::cli::{commands, Cli, Commands};
use chirpscope::{ReviewConfig, Result};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Chirpscope v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => ReviewConfig::load(path)?,
        None => ReviewConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Chirpscope v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &ReviewConfig) -> Result<()> {
    match cmd {
        Commands::Inspect { file } => commands::inspect(&file, config),
        Commands::Review { paths, filters } => commands::review(&paths, &filters, config),
        Commands::Url {
            base,
            date,
            species,
            filename,
            shifted,
        } => commands::print_url(&base, date, &species, &filename, shifted),
    }
}
