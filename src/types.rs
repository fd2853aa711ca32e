use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Lifecycle of a [`Supervisor`](crate::exec::Supervisor).
///
/// - `Idle`: constructed, nothing spawned yet.
/// - `Running`: `run` was accepted; the child is being set up or is alive.
/// - `Finished`: the completion signal has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Finished = 2,
}

impl RunState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Idle,
            1 => RunState::Running,
            _ => RunState::Finished,
        }
    }
}

/// Which standard stream of the child a line or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// What a line streamer does when the consumer's channel is full.
///
/// - `Block`: wait for the consumer (default). Consumers must drain every
///   stream until it closes, otherwise the producer stalls.
/// - `DropNewest`: discard the line that does not fit and keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    Block,
    DropNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Block
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop_newest" | "drop-newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(format!(
                "invalid overflow policy: {other} (expected \"block\" or \"drop_newest\")"
            )),
        }
    }
}

/// Why the termination controller stopped a child early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The configured run timeout elapsed.
    Timeout(Duration),
    /// [`Supervisor::cancel`](crate::exec::Supervisor::cancel) was called.
    Cancelled,
    /// The shutdown future passed to `run_until` resolved.
    Shutdown,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Timeout(d) => write!(f, "timed out after {d:?}"),
            TerminationReason::Cancelled => f.write_str("cancelled"),
            TerminationReason::Shutdown => f.write_str("caller shut down"),
        }
    }
}
