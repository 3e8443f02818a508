// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::types::RebuildMode;

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build front-end assets from a task graph and rebuild them on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Task paths are relative to its directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Build everything once and exit; non-zero exit status if any task failed.
    #[arg(long)]
    pub once: bool,

    /// Parse + validate, print the execution plan, but don't run any task.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[config].debounce_ms`.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Override `[config].rebuild` (`incremental` or `full`).
    #[arg(long, value_name = "MODE")]
    pub rebuild: Option<RebuildMode>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
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
