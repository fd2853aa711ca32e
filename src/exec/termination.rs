// src/exec/termination.rs

//! Termination controller.
//!
//! Races the configured timeout, the explicit cancel signal and the caller's
//! shutdown future against the child's own exit. Whichever trigger fires
//! first, the child is stopped through the same path so the lifecycle
//! coordinator sees exactly one exit.

use std::future::{Future, pending};
use std::io;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::errors::SupervisorError;
use crate::types::TerminationReason;

pub const DEFAULT_SENTINEL: &str = "q\n";
pub const DEFAULT_SENTINEL_GRACE: Duration = Duration::from_secs(2);

/// How a child is stopped once a termination trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TerminationStrategy {
    /// Kill the child outright.
    #[default]
    Kill,
    /// Write `input` to the child's stdin and give it `grace` to exit on its
    /// own. A child still running after `grace` is killed.
    Sentinel { input: String, grace: Duration },
}

impl TerminationStrategy {
    /// Sentinel strategy with the conventional `"q\n"` quit request.
    pub fn sentinel() -> Self {
        TerminationStrategy::Sentinel {
            input: DEFAULT_SENTINEL.to_string(),
            grace: DEFAULT_SENTINEL_GRACE,
        }
    }

    pub(crate) fn needs_stdin(&self) -> bool {
        matches!(self, TerminationStrategy::Sentinel { .. })
    }
}

/// Cloneable handle that asks a supervisor to stop its child early.
///
/// Cancelling before `run` makes the run stop its child as soon as it has
/// started. Cancelling more than once has no further effect.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

pub(crate) type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Everything that can end a run before the child exits on its own.
pub(crate) struct Triggers {
    pub timeout: Option<Duration>,
    pub cancel: watch::Receiver<bool>,
    pub shutdown: Option<ShutdownFuture>,
}

/// How the child ended, as seen by the lifecycle coordinator.
#[derive(Debug)]
pub(crate) struct ExitOutcome {
    pub status: io::Result<ExitStatus>,
    pub reason: Option<TerminationReason>,
}

impl ExitOutcome {
    /// The single failure to report for this exit, if any.
    ///
    /// A timeout is always a failure. Cancellation and shutdown only count
    /// when the child did not exit cleanly afterwards.
    pub fn into_failure(self) -> Option<SupervisorError> {
        match (self.status, self.reason) {
            (Err(source), _) => Some(SupervisorError::Wait { source }),
            (Ok(status), Some(reason @ TerminationReason::Timeout(_))) => {
                Some(SupervisorError::Terminated {
                    reason,
                    status: Some(status),
                })
            }
            (Ok(status), Some(reason)) if !status.success() => Some(SupervisorError::Terminated {
                reason,
                status: Some(status),
            }),
            (Ok(status), None) if !status.success() => Some(SupervisorError::Exit { status }),
            _ => None,
        }
    }
}

/// Wait for `child` to exit, stopping it early if a trigger fires first.
pub(crate) async fn supervise_exit(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    strategy: &TerminationStrategy,
    triggers: Triggers,
) -> ExitOutcome {
    let reason = tokio::select! {
        status = child.wait() => {
            return ExitOutcome { status, reason: None };
        }
        reason = next_trigger(triggers) => reason,
    };

    info!(%reason, "terminating child process");
    let status = terminate(child, stdin, strategy).await;

    ExitOutcome {
        status,
        reason: Some(reason),
    }
}

async fn next_trigger(triggers: Triggers) -> TerminationReason {
    let Triggers {
        timeout: run_limit,
        mut cancel,
        shutdown,
    } = triggers;

    let expired = async move {
        match run_limit {
            Some(limit) => {
                sleep(limit).await;
                limit
            }
            None => pending().await,
        }
    };

    let cancelled = async move {
        // All cancellers gone means nobody can cancel any more.
        let orphaned = cancel.wait_for(|c| *c).await.is_err();
        if orphaned {
            pending::<()>().await;
        }
    };

    let shut_down = async move {
        match shutdown {
            Some(fut) => fut.await,
            None => pending().await,
        }
    };

    tokio::select! {
        limit = expired => TerminationReason::Timeout(limit),
        _ = cancelled => TerminationReason::Cancelled,
        _ = shut_down => TerminationReason::Shutdown,
    }
}

async fn terminate(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    strategy: &TerminationStrategy,
) -> io::Result<ExitStatus> {
    if let TerminationStrategy::Sentinel { input, grace } = strategy {
        match stdin {
            Some(stdin) => match write_sentinel(stdin, input).await {
                Ok(()) => {
                    debug!(?grace, "sentinel written; waiting for child to quit");
                    match timeout(*grace, child.wait()).await {
                        Ok(status) => return status,
                        Err(_) => warn!(?grace, "child ignored sentinel; killing it"),
                    }
                }
                Err(e) => warn!(error = %e, "failed to write sentinel; killing child"),
            },
            None => warn!("stdin not held; cannot send sentinel, killing child"),
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
    child.wait().await
}

/// Writes the sentinel and closes stdin so the child also sees end-of-input.
async fn write_sentinel(mut stdin: ChildStdin, input: &str) -> io::Result<()> {
    stdin.write_all(input.as_bytes()).await?;
    stdin.flush().await?;
    drop(stdin);
    Ok(())
}
