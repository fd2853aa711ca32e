// src/errors.rs

//! Crate-wide error types.

use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

use crate::types::{StreamKind, TerminationReason};

/// Everything that can go wrong while supervising a child process.
///
/// Variants raised during a run are delivered on the failures stream; the
/// rest are returned directly from the call that hit them.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("runner was already started")]
    Dirty,

    #[error("command must contain at least the program to execute")]
    EmptyCommand,

    #[error("runner has not been started")]
    NotStarted,

    #[error("no Tokio runtime available to drive the process")]
    NoRuntime,

    #[error("output streams were already taken by another consumer")]
    StreamsTaken,

    #[error("{stream} not available")]
    Pipe { stream: StreamKind },

    #[error("failed to run command `{program}`: {source}")]
    Start {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to finish process: {status}")]
    Exit { status: ExitStatus },

    #[error("process terminated early ({reason}){}", describe_status(.status))]
    Terminated {
        reason: TerminationReason,
        status: Option<ExitStatus>,
    },

    #[error("{0}")]
    Stderr(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

fn describe_status(status: &Option<ExitStatus>) -> String {
    match status {
        Some(s) => format!(": {s}"),
        None => String::new(),
    }
}

impl SupervisorError {
    /// True for the failures that stop a run before any output is streamed.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            SupervisorError::Pipe { .. } | SupervisorError::Start { .. }
        )
    }

    /// True when the run was ended by the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SupervisorError::Terminated {
                reason: TerminationReason::Timeout(_),
                ..
            }
        )
    }
}

/// Several failures collected over one run.
///
/// Keeps each underlying error for inspection; `Display` joins their
/// messages with `"; "` in the order they were received.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<SupervisorError>,
}

impl AggregateError {
    pub(crate) fn new(errors: Vec<SupervisorError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[SupervisorError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SupervisorError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = SupervisorError> = std::result::Result<T, E>;
