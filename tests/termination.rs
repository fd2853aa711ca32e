use std::error::Error;
use std::time::{Duration, Instant};

use procstream::config::SupervisorConfig;
use procstream::{Supervisor, SupervisorError, TerminationReason, TerminationStrategy};
use procstream_test_utils::{collect_output, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn timeout_stops_long_running_command() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(["sleep", "10"])?;
    supervisor.set_timeout(Duration::from_millis(200));

    let started = Instant::now();
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");
    let output = with_timeout(collect_output(streams)).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "finished too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "timeout not honoured: {elapsed:?}");

    assert_eq!(output.failures.len(), 1, "failures: {:?}", output.failures);
    let failure = &output.failures[0];
    assert!(failure.is_timeout(), "expected timeout, got {failure:?}");
    assert!(failure.to_string().contains("timed out"), "{failure}");
    Ok(())
}

#[tokio::test]
async fn generous_timeout_does_not_interfere() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(["echo", "quick"])?;
    supervisor.set_timeout(Duration::from_secs(5));
    supervisor.run()?;

    with_timeout(supervisor.wait()).await?;
    Ok(())
}

#[tokio::test]
async fn cancel_kills_running_command() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sleep", "10"])?;
    let canceller = supervisor.canceller();

    let started = Instant::now();
    supervisor.run()?;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = with_timeout(supervisor.wait()).await;
    assert!(started.elapsed() < Duration::from_secs(3));

    match result {
        Err(SupervisorError::Terminated { reason, status }) => {
            assert_eq!(reason, TerminationReason::Cancelled);
            assert!(!status.expect("status after kill").success());
        }
        other => panic!("expected Terminated failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn cancel_before_run_stops_child_immediately() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sleep", "10"])?;
    supervisor.cancel();
    assert!(supervisor.canceller().is_cancelled());

    let started = Instant::now();
    supervisor.run()?;
    let result = with_timeout(supervisor.wait()).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(matches!(
        result,
        Err(SupervisorError::Terminated {
            reason: TerminationReason::Cancelled,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn sentinel_lets_child_quit_gracefully() -> TestResult {
    init_tracing();

    let mut supervisor =
        Supervisor::new(["sh", "-c", "read cmd; echo \"got $cmd\""])?;
    supervisor.set_termination(TerminationStrategy::sentinel());

    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");
    supervisor.cancel();

    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["got q\n"]);
    // Clean exit after a cancel is not a failure.
    assert!(output.failures.is_empty(), "failures: {:?}", output.failures);
    Ok(())
}

#[tokio::test]
async fn ignored_sentinel_falls_back_to_kill() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(["sleep", "10"])?;
    supervisor.set_termination(TerminationStrategy::Sentinel {
        input: "q\n".to_string(),
        grace: Duration::from_millis(200),
    });
    supervisor.set_timeout(Duration::from_millis(100));

    let started = Instant::now();
    supervisor.run()?;
    let result = with_timeout(supervisor.wait()).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "grace skipped: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "kill fallback missing: {elapsed:?}");

    let err = result.expect_err("timeout must be reported");
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    Ok(())
}

#[tokio::test]
async fn shutdown_future_terminates_run() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sleep", "10"])?;
    supervisor.run_until(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
    })?;

    match with_timeout(supervisor.wait()).await {
        Err(SupervisorError::Terminated { reason, .. }) => {
            assert_eq!(reason, TerminationReason::Shutdown);
        }
        other => panic!("expected Terminated failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn output_before_timeout_is_still_delivered() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(["sh", "-c", "echo before; exec sleep 10"])?;
    supervisor.set_timeout(Duration::from_millis(300));

    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");
    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["before\n"]);
    assert_eq!(output.failures.len(), 1);
    assert!(output.failures[0].is_timeout());
    Ok(())
}

#[tokio::test]
async fn grandchild_holding_stdout_does_not_stall_done() -> TestResult {
    init_tracing();

    // `sh` is killed on timeout, but the `sleep` it forked keeps the pipes open.
    let config = SupervisorConfig {
        timeout: Some(Duration::from_millis(200)),
        drain_grace: Duration::from_millis(300),
        ..Default::default()
    };
    let supervisor = Supervisor::with_config(["sh", "-c", "echo early; sleep 10; :"], config)?;
    assert_eq!(supervisor.config().drain_grace, Duration::from_millis(300));
    assert_eq!(supervisor.config().timeout, Some(Duration::from_millis(200)));

    let started = Instant::now();
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");
    let output = with_timeout(collect_output(streams)).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "finished too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "done waited on the grandchild: {elapsed:?}");

    assert_eq!(output.stdout, vec!["early\n".to_string()]);
    assert_eq!(output.failures.len(), 1, "failures: {:?}", output.failures);
    assert!(output.failures[0].is_timeout(), "{:?}", output.failures[0]);
    assert!(output.done_before_failures_closed);
    Ok(())
}
