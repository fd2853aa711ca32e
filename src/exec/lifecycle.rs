// src/exec/lifecycle.rs

//! Lifecycle coordinator: one per run.
//!
//! Spawns the child, hands its output pipes to the line streamers, waits for
//! the exit (through the termination controller), reports at most one
//! failure and fires the completion signal exactly once.

use std::future::pending;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::errors::{Result, SupervisorError};
use crate::exec::command::CommandSpec;
use crate::exec::streamer::{LineSink, stream_lines_until};
use crate::exec::termination::{Triggers, supervise_exit};
use crate::types::{RunState, StreamKind};

/// Producer ends of the four output streams for one run.
pub(crate) struct RunChannels {
    pub stdout: mpsc::Sender<String>,
    pub stderr: mpsc::Sender<String>,
    pub failures: mpsc::Sender<SupervisorError>,
    pub done: watch::Sender<bool>,
}

struct Launched {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// Drive one run from spawn to completion.
///
/// Ordering: streamers are joined before the exit failure is sent, the
/// failure is sent before `done` fires, and the failures sender is dropped
/// last. A consumer that drains every stream until it closes therefore sees
/// every line and every failure.
pub(crate) async fn coordinate(
    command: CommandSpec,
    config: SupervisorConfig,
    triggers: Triggers,
    channels: RunChannels,
    state: Arc<AtomicU8>,
) {
    let RunChannels {
        stdout: stdout_tx,
        stderr: stderr_tx,
        failures,
        done,
    } = channels;

    let launched = match launch(&command, &config).await {
        Ok(launched) => launched,
        Err(failure) => {
            warn!(command = %command, error = %failure, "process failed before start");
            // Capacity is at least one and nothing else sends, so this
            // never waits on the consumer.
            let _ = failures.send(failure).await;
            finish(&state, &done);
            return;
        }
    };

    let Launched {
        mut child,
        stdin,
        stdout,
        stderr,
    } = launched;

    info!(command = %command, pid = ?child.id(), "process started");

    let (stop_reading, stop_rx) = watch::channel(false);
    let streamers = vec![
        (
            StreamKind::Stdout,
            tokio::spawn(stream_lines_until(
                stdout,
                LineSink::new(stdout_tx, config.overflow),
                StreamKind::Stdout,
                stop_requested(stop_rx.clone()),
            )),
        ),
        (
            StreamKind::Stderr,
            tokio::spawn(stream_lines_until(
                stderr,
                LineSink::new(stderr_tx, config.overflow),
                StreamKind::Stderr,
                stop_requested(stop_rx),
            )),
        ),
    ];

    let outcome = supervise_exit(&mut child, stdin, &config.termination, triggers).await;

    match &outcome.status {
        Ok(status) => info!(
            command = %command,
            exit_code = status.code().unwrap_or(-1),
            success = status.success(),
            "process exited"
        ),
        Err(e) => warn!(command = %command, error = %e, "failed waiting for process"),
    }

    join_streamers(streamers, &stop_reading, config.drain_grace).await;

    if let Some(failure) = outcome.into_failure() {
        let _ = failures.send(failure).await;
    }

    finish(&state, &done);
    drop(failures);
    debug!(command = %command, "run finished");
}

async fn launch(command: &CommandSpec, config: &SupervisorConfig) -> Result<Launched> {
    let needs_stdin = config.termination.needs_stdin();

    let mut cmd = Command::new(command.program());
    cmd.args(command.args())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if needs_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    attach(cmd, command.program(), needs_stdin).await
}

/// Spawn `cmd` and take the pipes the run needs. A child whose pipes cannot
/// be taken is killed before the failure is returned.
async fn attach(mut cmd: Command, program: &str, needs_stdin: bool) -> Result<Launched> {
    let mut child = cmd.spawn().map_err(|source| SupervisorError::Start {
        program: program.to_string(),
        source,
    })?;

    match take_pipes(&mut child, needs_stdin) {
        Ok((stdin, stdout, stderr)) => Ok(Launched {
            child,
            stdin,
            stdout,
            stderr,
        }),
        Err(failure) => {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "failed to kill child after pipe failure");
            }
            Err(failure)
        }
    }
}

fn take_pipes(
    child: &mut Child,
    needs_stdin: bool,
) -> Result<(Option<ChildStdin>, ChildStdout, ChildStderr)> {
    let stdout = child.stdout.take().ok_or(SupervisorError::Pipe {
        stream: StreamKind::Stdout,
    })?;
    let stderr = child.stderr.take().ok_or(SupervisorError::Pipe {
        stream: StreamKind::Stderr,
    })?;
    let stdin = if needs_stdin {
        Some(child.stdin.take().ok_or(SupervisorError::Pipe {
            stream: StreamKind::Stdin,
        })?)
    } else {
        None
    };
    Ok((stdin, stdout, stderr))
}

/// Wait for the streamers to deliver what the child wrote before exiting.
///
/// A streamer that reaches end-of-stream is always awaited in full, however
/// slowly the consumer drains it. Only pipes still open once `grace` has
/// passed (a grandchild holding them, typically) are told to stop reading;
/// lines already read are still delivered.
async fn join_streamers(
    streamers: Vec<(StreamKind, JoinHandle<usize>)>,
    stop_reading: &watch::Sender<bool>,
    grace: Duration,
) {
    let deadline = Instant::now() + grace;
    let mut lingering = Vec::new();

    for (stream, mut handle) in streamers {
        match timeout_at(deadline, &mut handle).await {
            Ok(joined) => log_joined(stream, joined),
            Err(_) => lingering.push((stream, handle)),
        }
    }

    if lingering.is_empty() {
        return;
    }

    debug!(?grace, "drain grace elapsed; asking open streams to stop reading");
    stop_reading.send_replace(true);

    for (stream, handle) in lingering {
        log_joined(stream, handle.await);
    }
}

fn log_joined(stream: StreamKind, joined: std::result::Result<usize, JoinError>) {
    match joined {
        Ok(lines) => debug!(%stream, lines, "line streamer joined"),
        Err(e) => warn!(%stream, error = %e, "line streamer task failed"),
    }
}

/// Resolves once the coordinator asks streamers to stop reading.
async fn stop_requested(mut stop: watch::Receiver<bool>) {
    // A dropped sender means the coordinator is gone; keep reading to EOF.
    let closed = stop.wait_for(|s| *s).await.is_err();
    if closed {
        pending::<()>().await;
    }
}

fn finish(state: &AtomicU8, done: &watch::Sender<bool>) {
    state.store(RunState::Finished as u8, Ordering::Release);
    done.send_replace(true);
}
