// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procstream`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procstream",
    version,
    about = "Run a command, stream its output line by line and report how it ended.",
    long_about = None
)]
pub struct CliArgs {
    /// Optional TOML file with run, stream and termination settings.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Stop the command after this long (e.g. "250ms", "30s", "5m").
    ///
    /// Overrides `[run].timeout` from the config file.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Ask the command to quit by writing this line to its stdin instead of
    /// killing it. The command is still killed if it does not exit in time.
    #[arg(long, value_name = "TEXT")]
    pub sentinel: Option<String>,

    /// Treat every stderr line as an error in the final report.
    #[arg(long)]
    pub collect_stderr: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCSTREAM_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The program to run, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
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
