use std::error::Error;
use std::time::Duration;

use procstream::{Supervisor, SupervisorError, WaitOptions};
use procstream_test_utils::{collect_output, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn echo_streams_single_line_with_terminator() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["echo", "1"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["1\n".to_string()]);
    assert!(output.stderr.is_empty(), "unexpected stderr: {:?}", output.stderr);
    assert!(output.failures.is_empty(), "unexpected failures: {:?}", output.failures);
    Ok(())
}

#[tokio::test]
async fn silent_success_closes_streams_without_lines() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["true"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
    assert!(output.failures.is_empty());
    Ok(())
}

#[tokio::test]
async fn wait_returns_ok_for_clean_exit() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["echo", "1"])?;
    supervisor.run()?;

    with_timeout(supervisor.wait()).await?;
    assert_eq!(supervisor.state(), procstream::RunState::Finished);
    Ok(())
}

#[tokio::test]
async fn lines_arrive_in_emission_order() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["printf", "alpha\nbeta\ngamma\n"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["alpha\n", "beta\n", "gamma\n"]);
    Ok(())
}

#[tokio::test]
async fn trailing_unterminated_line_is_delivered() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["printf", "first\nlast"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["first\n", "last"]);
    Ok(())
}

#[tokio::test]
async fn many_lines_are_all_delivered() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["seq", "1", "500"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    let expected: Vec<String> = (1..=500).map(|n| format!("{n}\n")).collect();
    assert_eq!(output.stdout, expected);
    Ok(())
}

#[tokio::test]
async fn stderr_is_streamed_separately() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sh", "-c", "echo out; echo oops >&2"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let output = with_timeout(collect_output(streams)).await;

    assert_eq!(output.stdout, vec!["out\n"]);
    assert_eq!(output.stderr, vec!["oops\n"]);
    assert!(output.failures.is_empty());
    Ok(())
}

#[tokio::test]
async fn stderr_lines_fold_into_aggregate_when_collected() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sh", "-c", "echo first >&2; echo second >&2"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let result = with_timeout(streams.wait(WaitOptions::default().with_stderr(true))).await;

    match result {
        Err(SupervisorError::Aggregate(agg)) => {
            assert_eq!(agg.len(), 2);
            assert_eq!(agg.to_string(), "first; second");
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn wait_with_sees_every_line() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["sh", "-c", "echo a; echo b >&2; echo c"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    with_timeout(streams.wait_with(WaitOptions::default(), |stream, line| match stream {
        procstream::StreamKind::Stderr => stderr.push(line.to_string()),
        _ => stdout.push(line.to_string()),
    }))
    .await?;

    assert_eq!(stdout, vec!["a\n", "c\n"]);
    assert_eq!(stderr, vec!["b\n"]);
    Ok(())
}

#[tokio::test]
async fn done_signal_is_shared_between_clones() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["true"])?;
    supervisor.run()?;
    let streams = supervisor.stream_output().expect("streams after run");
    let mut observer = streams.done.clone();

    let output = with_timeout(collect_output(streams)).await;
    assert!(output.failures.is_empty());

    with_timeout(observer.wait()).await;
    assert!(observer.is_done());
    Ok(())
}

#[tokio::test]
async fn slow_consumer_receives_every_line_past_drain_grace() -> TestResult {
    init_tracing();

    let supervisor = Supervisor::new(["seq", "1", "20"])?;
    supervisor.run()?;
    let procstream::OutputStreams {
        mut done,
        mut stdout,
        mut stderr,
        mut failures,
    } = supervisor.stream_output().expect("streams after run");

    // 20 lines at 100ms each outlasts the default one-second drain grace.
    let consume = async {
        let mut lines = Vec::new();
        let (mut out_open, mut err_open, mut fail_open) = (true, true, true);
        while out_open || err_open || fail_open {
            tokio::select! {
                line = stdout.recv(), if out_open => match line {
                    Some(line) => {
                        lines.push(line);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    None => out_open = false,
                },
                line = stderr.recv(), if err_open => {
                    err_open = line.is_some();
                }
                failure = failures.recv(), if fail_open => match failure {
                    Some(failure) => panic!("unexpected failure: {failure}"),
                    None => fail_open = false,
                },
            }
        }
        done.wait().await;
        lines
    };
    let lines = with_timeout(consume).await;

    let expected: Vec<String> = (1..=20).map(|n| format!("{n}\n")).collect();
    assert_eq!(lines, expected);
    Ok(())
}
