// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one external command with `tokio::process::Command`
//! and streams what it prints back to the caller.
//!
//! - [`supervisor`] owns the public `Supervisor` and its output streams.
//! - [`lifecycle`] drives a single run from spawn to the completion signal.
//! - [`streamer`] turns stdout/stderr into text lines.
//! - [`termination`] stops a child early on timeout, cancel or shutdown.
//! - [`aggregate`] drains a run and folds its failures into one error.
//! - [`command`] and [`quote`] are small helpers.

pub mod aggregate;
pub mod command;
mod lifecycle;
pub mod quote;
pub mod streamer;
pub mod supervisor;
pub mod termination;

pub use aggregate::WaitOptions;
pub use command::CommandSpec;
pub use quote::quote;
pub use streamer::{LineSink, stream_lines, stream_lines_until};
pub use supervisor::{DoneSignal, OutputStreams, Supervisor};
pub use termination::{Canceller, TerminationStrategy};
