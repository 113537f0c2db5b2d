//! Geoloc CLI - drive the location orchestration against a scripted device.
//!
//! The device is described by a scenario file (see [`scenario`]); requests
//! use the options from `~/.geoloc/config.ini`, overridable per command.

mod commands;
mod error;
mod scenario;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geoloc::config::ConfigFile;
use geoloc::logging::init_logging;

use commands::common::LocationArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "geoloc")]
#[command(version)]
#[command(about = "Device location with settings resolution and native fallback")]
#[command(long_about = None)]
struct Cli {
    /// Scenario file describing the simulated device
    #[arg(long, global = true)]
    scenario: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the current position once
    Position {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Watch the position until interrupted
    Watch {
        /// Watch identifier
        #[arg(long, default_value = "cli")]
        id: String,

        /// Stop after this many updates
        #[arg(long)]
        count: Option<usize>,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config { command } = cli.command {
        return commands::config::run(command);
    }

    let config = ConfigFile::load()?;
    let _logging_guard = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    match cli.command {
        Commands::Position { location } => {
            commands::position::run(&location, cli.scenario.as_ref(), &config)
        }
        Commands::Watch {
            id,
            count,
            location,
        } => commands::watch::run(&location, &id, count, cli.scenario.as_ref(), &config),
        Commands::Config { .. } => Ok(()),
    }
}
