//! # Combat Emulator
//!
//! Command-line entry point.
//!
//! - `run`: one emulation of a team, an action sequence and a target,
//!   written as a frame log
//! - `batch`: many seeded runs on a worker pool, with per-run artifacts and
//!   a DPS summary
//! - `kits`: lists the motion kits available to characters
//! - `init-config`: writes the effective configuration file

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EmulatorConfig;

#[derive(Parser, Debug)]
#[command(name = "emulator", version, about = "Frame-stepped combat emulator")]
struct Cli {
    /// Configuration file (defaults to the user config path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(commands::Run),
    Batch(commands::Batch),
    Kits(commands::Kits),
    InitConfig(commands::InitConfig),
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EmulatorConfig::load_from(path),
        None => EmulatorConfig::load(),
    };
    config.validate();

    // Logs go to stderr; stdout carries results and progress
    let json = cli.log_json || config.json_logs;
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(EnvFilter::from_default_env().add_directive("emulator=info".parse()?))
        .init();

    info!("Emulator {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run(cmd) => cmd.execute(config),
        Command::Batch(cmd) => cmd.execute(config),
        Command::Kits(cmd) => cmd.execute(&config),
        Command::InitConfig(cmd) => cmd.execute(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_batch() {
        let cli = Cli::try_parse_from([
            "emulator", "batch", "--team", "t.json", "--actions", "a.json", "--target",
            "x.json", "-n", "50", "--pool", "8", "--crit", "expected",
        ])
        .expect("parses");
        match cli.command {
            Command::Batch(batch) => {
                assert_eq!(batch.runs, Some(50));
                assert_eq!(batch.pool, Some(8));
                assert_eq!(batch.crit, commands::CritArg::Expected);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["emulator", "kits", "--config", "my.toml"])
            .expect("parses");
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert!(matches!(cli.command, Command::Kits(_)));
    }
}
