use std::sync::Once;
use std::time::Duration;

use procstream::{OutputStreams, SupervisorError};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=procstream=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Everything one run produced, in arrival order per stream.
#[derive(Debug, Default)]
pub struct CollectedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub failures: Vec<SupervisorError>,
    /// Whether `done` had already fired when the failures stream closed.
    pub done_before_failures_closed: bool,
}

/// Drain all streams of a run until they close and `done` fires.
pub async fn collect_output(streams: OutputStreams) -> CollectedOutput {
    let OutputStreams {
        mut done,
        mut stdout,
        mut stderr,
        mut failures,
    } = streams;

    let mut collected = CollectedOutput::default();
    let (mut out_open, mut err_open, mut fail_open) = (true, true, true);

    while out_open || err_open || fail_open {
        tokio::select! {
            line = stdout.recv(), if out_open => match line {
                Some(line) => collected.stdout.push(line),
                None => out_open = false,
            },
            line = stderr.recv(), if err_open => match line {
                Some(line) => collected.stderr.push(line),
                None => err_open = false,
            },
            failure = failures.recv(), if fail_open => match failure {
                Some(failure) => collected.failures.push(failure),
                None => {
                    fail_open = false;
                    collected.done_before_failures_closed = done.is_done();
                }
            },
        }
    }

    done.wait().await;
    collected
}
