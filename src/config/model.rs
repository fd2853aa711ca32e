// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::termination::TerminationStrategy;
use crate::types::OverflowPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// timeout = "5s"
/// drain_grace = "1s"
///
/// [stream]
/// capacity = 1
/// overflow = "block"
///
/// [termination]
/// strategy = "sentinel"
/// sentinel = "q\n"
/// grace = "2s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub termination: TerminationSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    /// Ceiling on total run time (e.g. `"30s"`). No ceiling when absent.
    #[serde(default)]
    pub timeout: Option<String>,

    /// How long to wait for the line streamers to flush after the child has
    /// exited. Defaults to one second.
    #[serde(default)]
    pub drain_grace: Option<String>,
}

/// `[stream]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    /// Capacity of each output channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_capacity() -> usize {
    1
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// `[termination]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminationSection {
    /// `"kill"` (default) or `"sentinel"`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Text written to the child's stdin when using the sentinel strategy.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// How long the child gets to honour the sentinel before it is killed.
    #[serde(default)]
    pub grace: Option<String>,
}

fn default_strategy() -> String {
    "kill".to_string()
}

fn default_sentinel() -> String {
    "q\n".to_string()
}

impl Default for TerminationSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            sentinel: default_sentinel(),
            grace: None,
        }
    }
}

/// Validated settings for one [`Supervisor`](crate::exec::Supervisor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub timeout: Option<Duration>,
    pub termination: TerminationStrategy,
    pub stream_capacity: usize,
    pub overflow: OverflowPolicy,
    pub drain_grace: Duration,
}

pub(crate) const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(1);

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            termination: TerminationStrategy::default(),
            stream_capacity: default_capacity(),
            overflow: OverflowPolicy::default(),
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}
