// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `runsource`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runsource",
    version,
    about = "Run an application from a source repository.",
    long_about = None
)]
pub struct CliArgs {
    /// Url to source repository.
    #[arg(value_name = "REPO")]
    pub repo: String,

    /// Path in the repository to the project to run.
    #[arg(long, value_name = "PATH")]
    pub project: Option<PathBuf>,

    /// Source repository branch to use (default: the repository's default
    /// branch).
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Interval at which to poll the source repository for changes
    /// (default: 5m), e.g. `30s`, `5m`, `1h30m`.
    #[arg(long, value_name = "DURATION")]
    pub poll_interval: Option<String>,

    /// Settings file (TOML). Defaults to `RunSource.toml` when present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNSOURCE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
