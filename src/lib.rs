// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::io::Write;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{SupervisorConfig, load_and_validate, parse_duration};
use crate::exec::termination::DEFAULT_SENTINEL_GRACE;

pub use crate::errors::{AggregateError, SupervisorError};
pub use crate::exec::{
    Canceller, CommandSpec, DoneSignal, OutputStreams, Supervisor, TerminationStrategy,
    WaitOptions, quote,
};
pub use crate::types::{OverflowPolicy, RunState, StreamKind, TerminationReason};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the supervisor for the requested command
/// - echoing the child's output
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config = effective_config(&args)?;
    let supervisor = Supervisor::with_config(args.command.iter().cloned(), config)?;

    // Ctrl-C → stop the child through the configured strategy.
    {
        let canceller = supervisor.canceller();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; stopping child");
            canceller.cancel();
        });
    }

    supervisor.run()?;

    let streams = supervisor
        .stream_output()
        .context("output streams were taken before the run could be observed")?;

    let options = WaitOptions::default().with_stderr(args.collect_stderr);
    streams
        .wait_with(options, echo_line)
        .await
        .with_context(|| format!("command `{}` failed", supervisor.command()))
}

/// Start from the config file (if any) and apply CLI overrides on top.
fn effective_config(args: &CliArgs) -> Result<SupervisorConfig> {
    let mut config = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config from '{path}'"))?,
        None => SupervisorConfig::default(),
    };

    if let Some(raw) = &args.timeout {
        let limit = parse_duration(raw).map_err(|e| anyhow!("invalid --timeout: {e}"))?;
        if limit.is_zero() {
            bail!("--timeout must be greater than zero");
        }
        config.timeout = Some(limit);
    }

    if let Some(sentinel) = &args.sentinel {
        let grace = match config.termination {
            TerminationStrategy::Sentinel { grace, .. } => grace,
            TerminationStrategy::Kill => DEFAULT_SENTINEL_GRACE,
        };
        let mut input = sentinel.clone();
        if !input.ends_with('\n') {
            input.push('\n');
        }
        config.termination = TerminationStrategy::Sentinel { input, grace };
    }

    debug!(?config, "effective configuration");
    Ok(config)
}

/// Echo a child line to the matching stream of this process.
fn echo_line(stream: StreamKind, line: &str) {
    // A closed terminal or pipe on our side must not abort the run.
    let _ = match stream {
        StreamKind::Stderr => {
            let mut err = std::io::stderr().lock();
            err.write_all(line.as_bytes()).and_then(|()| err.flush())
        }
        _ => {
            let mut out = std::io::stdout().lock();
            out.write_all(line.as_bytes()).and_then(|()| out.flush())
        }
    };
}
