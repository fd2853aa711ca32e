// src/exec/aggregate.rs

//! Error aggregator: drain a run and fold its failures into one error.

use tracing::debug;

use crate::errors::{AggregateError, Result, SupervisorError};
use crate::exec::supervisor::OutputStreams;
use crate::types::StreamKind;

/// What [`OutputStreams::wait`] collects while draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Collect errors from the failures stream (default `true`).
    pub collect_failures: bool,
    /// Treat every stderr line as an error (default `false`).
    pub collect_stderr: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            collect_failures: true,
            collect_stderr: false,
        }
    }
}

impl WaitOptions {
    pub fn with_stderr(mut self, collect: bool) -> Self {
        self.collect_stderr = collect;
        self
    }

    pub fn with_failures(mut self, collect: bool) -> Self {
        self.collect_failures = collect;
        self
    }
}

impl OutputStreams {
    /// Drain every stream until the run completes, then return:
    ///
    /// - `Ok(())` when nothing was collected,
    /// - the error itself when exactly one was collected,
    /// - [`SupervisorError::Aggregate`] otherwise.
    ///
    /// Lines that are not collected are discarded. Must not run alongside
    /// another consumer of the same streams.
    pub async fn wait(self, options: WaitOptions) -> Result<()> {
        self.wait_with(options, |_, _| {}).await
    }

    /// Same as [`OutputStreams::wait`], but hands every stdout and stderr
    /// line to `on_line` as it arrives.
    pub async fn wait_with<F>(self, options: WaitOptions, mut on_line: F) -> Result<()>
    where
        F: FnMut(StreamKind, &str),
    {
        let OutputStreams {
            mut done,
            mut stdout,
            mut stderr,
            mut failures,
        } = self;

        let mut errors = Vec::new();
        let (mut stdout_open, mut stderr_open, mut failures_open) = (true, true, true);

        while stdout_open || stderr_open || failures_open {
            tokio::select! {
                line = stdout.recv(), if stdout_open => match line {
                    Some(line) => on_line(StreamKind::Stdout, &line),
                    None => stdout_open = false,
                },
                line = stderr.recv(), if stderr_open => match line {
                    Some(line) => {
                        on_line(StreamKind::Stderr, &line);
                        if options.collect_stderr {
                            errors.push(SupervisorError::Stderr(
                                line.trim_end_matches(['\r', '\n']).to_string(),
                            ));
                        }
                    }
                    None => stderr_open = false,
                },
                failure = failures.recv(), if failures_open => match failure {
                    Some(failure) => {
                        debug!(error = %failure, "failure received");
                        if options.collect_failures {
                            errors.push(failure);
                        }
                    }
                    None => failures_open = false,
                },
            }
        }

        done.wait().await;
        fold(errors)
    }
}

/// Fold collected errors into the result of a run.
pub fn fold(mut errors: Vec<SupervisorError>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(AggregateError::new(errors).into()),
    }
}
