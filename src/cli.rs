// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::BuildVariant;

/// Command-line arguments for `spabuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "spabuild",
    version,
    about = "Build a single-page application: lint, bundle scripts, compile styles, render markup.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run (`production`, `development`, `watch`, `clean`, or any
    /// configured task).
    #[arg(value_name = "TASK", default_value = "production")]
    pub task: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Spabuild.toml` in the current working directory. A missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Build variant for tasks that do not pin one.
    ///
    /// If omitted, `SPABUILD_ENV` or `production` is used.
    #[arg(long, value_enum, value_name = "VARIANT")]
    pub variant: Option<VariantArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SPABUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print the task graph without building.
    #[arg(long)]
    pub dry_run: bool,
}

/// Variant as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    Development,
    Production,
}

impl From<VariantArg> for BuildVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Development => BuildVariant::Development,
            VariantArg::Production => BuildVariant::Production,
        }
    }
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
