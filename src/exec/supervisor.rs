// src/exec/supervisor.rs

//! The public process supervisor.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::SupervisorConfig;
use crate::errors::{Result, SupervisorError};
use crate::exec::command::CommandSpec;
use crate::exec::lifecycle::{RunChannels, coordinate};
use crate::exec::termination::{Canceller, ShutdownFuture, TerminationStrategy, Triggers};
use crate::types::{OverflowPolicy, RunState};

/// Completion signal of a run.
///
/// Fires once the child has exited, or once the run has failed before the
/// child could start. Cloneable; every clone observes the same signal.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<bool>,
}

impl DoneSignal {
    /// Resolve once the run is complete. Returns immediately afterwards.
    pub async fn wait(&mut self) {
        // A dropped sender means the coordinator is gone; count that as done
        // rather than leave the caller hanging.
        let _ = self.rx.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Consumer ends of one run's output.
///
/// Every stream must be drained until it yields `None`; with the default
/// [`OverflowPolicy::Block`] an undrained stream stalls its producer.
/// [`OutputStreams::wait`] does this for callers that only want the outcome.
#[derive(Debug)]
pub struct OutputStreams {
    pub done: DoneSignal,
    pub stdout: mpsc::Receiver<String>,
    pub stderr: mpsc::Receiver<String>,
    pub failures: mpsc::Receiver<SupervisorError>,
}

/// Supervises a single run of one external command.
///
/// ```no_run
/// # async fn demo() -> procstream::errors::Result<()> {
/// use procstream::Supervisor;
///
/// let supervisor = Supervisor::new(["echo", "1"])?;
/// supervisor.run()?;
/// supervisor.wait().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Supervisor {
    command: CommandSpec,
    config: SupervisorConfig,
    state: Arc<AtomicU8>,
    canceller: Canceller,
    streams: Mutex<Option<OutputStreams>>,
}

impl Supervisor {
    /// Build an inert supervisor. No I/O happens until [`Supervisor::run`].
    pub fn new<I, S>(command: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(command, SupervisorConfig::default())
    }

    pub fn with_config<I, S>(command: I, config: SupervisorConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            command: CommandSpec::new(command)?,
            config,
            state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
            canceller: Canceller::new(),
            streams: Mutex::new(None),
        })
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Ceiling on total run time. Only affects runs started afterwards.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = Some(timeout);
    }

    pub fn set_termination(&mut self, strategy: TerminationStrategy) {
        self.config.termination = strategy;
    }

    /// Channel capacity (clamped to at least one) and what to do when full.
    pub fn set_stream_buffer(&mut self, capacity: usize, overflow: OverflowPolicy) {
        self.config.stream_capacity = capacity.max(1);
        self.config.overflow = overflow;
    }

    /// Handle for stopping the child from elsewhere.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Ask the running child to stop, using the configured strategy.
    pub fn cancel(&self) {
        debug!(command = %self.command, "cancel requested");
        self.canceller.cancel();
    }

    /// Start the child in the background and return immediately.
    ///
    /// Must be called from within a Tokio runtime. Succeeds at most once per
    /// supervisor; later calls return [`SupervisorError::Dirty`] and spawn
    /// nothing. Spawn and pipe failures are reported on the failures stream.
    pub fn run(&self) -> Result<()> {
        self.start(None)
    }

    /// Like [`Supervisor::run`], but also stops the child when `shutdown`
    /// resolves.
    pub fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.start(Some(Box::pin(shutdown)))
    }

    /// Take the output streams of the current run.
    ///
    /// Returns `None` before `run` and for every call after the first.
    pub fn stream_output(&self) -> Option<OutputStreams> {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drain the run to completion and return its failures, folded into one
    /// error. See [`OutputStreams::wait`].
    pub async fn wait(&self) -> Result<()> {
        match self.stream_output() {
            Some(streams) => streams.wait(Default::default()).await,
            None if self.state() == RunState::Idle => Err(SupervisorError::NotStarted),
            None => Err(SupervisorError::StreamsTaken),
        }
    }

    fn start(&self, shutdown: Option<ShutdownFuture>) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| SupervisorError::NoRuntime)?;

        self.state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| SupervisorError::Dirty)?;

        let capacity = self.config.stream_capacity.max(1);
        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);
        let (failures_tx, failures_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = watch::channel(false);

        *self.streams.lock().unwrap_or_else(PoisonError::into_inner) = Some(OutputStreams {
            done: DoneSignal { rx: done_rx },
            stdout: stdout_rx,
            stderr: stderr_rx,
            failures: failures_rx,
        });

        let triggers = Triggers {
            timeout: self.config.timeout,
            cancel: self.canceller.subscribe(),
            shutdown,
        };
        let channels = RunChannels {
            stdout: stdout_tx,
            stderr: stderr_tx,
            failures: failures_tx,
            done: done_tx,
        };

        info!(
            command = %self.command,
            timeout = ?self.config.timeout,
            "starting supervised process"
        );

        handle.spawn(coordinate(
            self.command.clone(),
            self.config.clone(),
            triggers,
            channels,
            Arc::clone(&self.state),
        ));

        Ok(())
    }
}
