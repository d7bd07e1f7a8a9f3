// tests/deploy_loop_fake_backend.rs

mod common;
use crate::common::{init_tracing, wait_until};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use runsource::{interrupt_action, run_with_backend, InterruptAction};
use runsource_test_utils::builders::SettingsBuilder;
use runsource_test_utils::fake_backend::{Call, FakeBackend, Remote};
use runsource_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

fn commit(id: &str) -> Remote {
    Remote::Commit(id.to_string())
}

fn launch(id: &str) -> Call {
    Call::Launch(PathBuf::from("/fake/published").join(id).join("app.dll"))
}

#[tokio::test]
async fn branch_change_restarts_application_on_new_commit() -> TestResult {
    init_tracing();

    // A is seen twice, then the branch moves to B, then the remote goes away
    // so the loop ends on its own.
    let backend = FakeBackend::new(vec![
        commit("aaa"),
        commit("aaa"),
        commit("bbb"),
        Remote::Unavailable,
    ]);
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(
        probe.calls(),
        vec![
            Call::Prepare,
            Call::Resolve,
            Call::Fetch("aaa".into()),
            Call::Publish("aaa".into()),
            launch("aaa"),
            Call::Resolve,
            Call::Resolve,
            Call::Stop,
            Call::ClearPublished,
            Call::Fetch("bbb".into()),
            Call::Publish("bbb".into()),
            launch("bbb"),
            Call::Resolve,
            Call::Stop,
        ]
    );
    assert_eq!(probe.launched(), vec!["aaa", "bbb"]);
    assert_eq!(probe.max_live(), 1);
    assert_eq!(probe.live(), 0);

    assert_eq!(report.cycles, 2);
    assert!(!report.interrupted);
    let err = report.last_error.expect("loop ended on a failure");
    assert!(err.contains("unavailable"), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn exactly_one_stop_between_consecutive_launches() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(vec![
        commit("c1"),
        commit("c2"),
        commit("c3"),
        commit("c3"),
        commit("c4"),
        Remote::Unavailable,
    ]);
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();

    with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(probe.launched(), vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(probe.fetched(), vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(probe.max_live(), 1);

    let calls = probe.calls();
    let launches: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::Launch(_)))
        .map(|(i, _)| i)
        .collect();
    for pair in launches.windows(2) {
        let stops = calls[pair[0]..pair[1]]
            .iter()
            .filter(|c| **c == Call::Stop)
            .count();
        assert_eq!(stops, 1, "calls: {calls:?}");
    }

    Ok(())
}

#[tokio::test]
async fn build_failure_is_fatal_without_retries() -> TestResult {
    init_tracing();

    let backend = FakeBackend::with_commits(&["aaa"]).fail_publish("aaa");
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(
        probe.calls(),
        vec![
            Call::Prepare,
            Call::Resolve,
            Call::Fetch("aaa".into()),
            Call::Publish("aaa".into()),
            Call::Stop,
        ]
    );
    assert_eq!(report.cycles, 0);

    let err = report.last_error.expect("build failure is reported");
    assert!(err.starts_with("build failed"), "unexpected error: {err}");
    assert!(err.contains("error: error CS1002"), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn unreachable_remote_at_startup_never_fetches() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(vec![Remote::Unavailable]);
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(probe.calls(), vec![Call::Prepare, Call::Resolve, Call::Stop]);
    assert!(probe.fetched().is_empty());
    assert_eq!(report.cycles, 0);

    Ok(())
}

#[tokio::test]
async fn fetch_failure_for_new_commit_ends_loop_after_old_app_stopped() -> TestResult {
    init_tracing();

    let backend = FakeBackend::with_commits(&["aaa", "bbb"]).fail_fetch("bbb");
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(probe.launched(), vec!["aaa"]);
    assert_eq!(probe.fetched(), vec!["aaa", "bbb"]);
    assert_eq!(probe.live(), 0);
    assert_eq!(report.cycles, 1);

    Ok(())
}

#[tokio::test]
async fn retries_rebuild_up_to_the_budget() -> TestResult {
    init_tracing();

    let backend = FakeBackend::with_commits(&["aaa"]).fail_publish("aaa");
    let probe = backend.clone();
    let settings = SettingsBuilder::new().max_retries(2).build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    // First attempt plus two retries, each starting from a fresh resolve.
    assert_eq!(probe.count(&Call::Publish("aaa".into())), 3);
    assert_eq!(probe.count(&Call::Resolve), 3);
    assert_eq!(probe.count(&Call::Prepare), 1);
    assert!(probe.launched().is_empty());
    assert_eq!(report.cycles, 0);

    Ok(())
}

#[tokio::test]
async fn poll_failure_under_retry_keeps_application_running() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(vec![
        commit("aaa"),
        Remote::Unavailable,
        commit("bbb"),
        Remote::Unavailable,
    ]);
    let probe = backend.clone();
    let settings = SettingsBuilder::new().max_retries(1).build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    // The failed poll backs off and polls again without touching the app;
    // the launch of B resets the failure count, so B gets its own retry.
    assert_eq!(
        probe.calls(),
        vec![
            Call::Prepare,
            Call::Resolve,
            Call::Fetch("aaa".into()),
            Call::Publish("aaa".into()),
            launch("aaa"),
            Call::Resolve,
            Call::Resolve,
            Call::Stop,
            Call::ClearPublished,
            Call::Fetch("bbb".into()),
            Call::Publish("bbb".into()),
            launch("bbb"),
            Call::Resolve,
            Call::Resolve,
            Call::Stop,
        ]
    );
    assert_eq!(report.cycles, 2);

    Ok(())
}

#[tokio::test]
async fn interrupt_while_watching_stops_application() -> TestResult {
    init_tracing();

    let backend = FakeBackend::with_commits(&["aaa"]);
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();
    let (tx, rx) = mpsc::channel(1);

    let (report, ()) = with_timeout(async {
        tokio::join!(run_with_backend(backend, &settings, Some(rx)), async {
            wait_until("application launched", || probe.live() == 1).await;
            tx.send(()).await.expect("runtime is listening");
        })
    })
    .await;

    assert!(report.interrupted);
    assert_eq!(report.cycles, 1);
    assert!(report.last_error.is_none());
    assert_eq!(probe.live(), 0);
    assert_eq!(probe.calls().last(), Some(&Call::Stop));
    assert_eq!(probe.count(&Call::Stop), 1);

    Ok(())
}

#[tokio::test]
async fn exited_application_is_not_restarted_while_watching() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(vec![
        commit("aaa"),
        commit("aaa"),
        commit("aaa"),
        Remote::Unavailable,
    ])
    .crash_on_launch();
    let probe = backend.clone();
    let settings = SettingsBuilder::new().watch_child_liveness(true).build();

    let report = with_timeout(run_with_backend(backend, &settings, None)).await;

    assert_eq!(probe.launched(), vec!["aaa"]);
    assert_eq!(probe.count(&Call::Resolve), 4);
    assert_eq!(report.cycles, 1);

    Ok(())
}

#[tokio::test]
async fn interrupt_while_terminating_finishes_the_stop_in_cleanup() -> TestResult {
    init_tracing();

    let backend = FakeBackend::with_commits(&["aaa", "bbb"]).slow_stop(Duration::from_millis(300));
    let probe = backend.clone();
    let settings = SettingsBuilder::new().build();
    let (tx, rx) = mpsc::channel(1);

    let (report, ()) = with_timeout(async {
        tokio::join!(run_with_backend(backend, &settings, Some(rx)), async {
            wait_until("stop requested", || probe.count(&Call::Stop) == 1).await;
            tx.send(()).await.expect("runtime is listening");
        })
    })
    .await;

    assert!(report.interrupted);
    assert_eq!(
        probe.calls(),
        vec![
            Call::Prepare,
            Call::Resolve,
            Call::Fetch("aaa".into()),
            Call::Publish("aaa".into()),
            launch("aaa"),
            Call::Resolve,
            Call::Stop,
            Call::Stop,
        ]
    );
    assert_eq!(probe.live(), 0);
    assert!(probe.fetched().iter().all(|c| c == "aaa"));

    Ok(())
}

#[test]
fn second_interrupt_forces_exit() {
    assert_eq!(interrupt_action(1), InterruptAction::Shutdown);
    assert_eq!(interrupt_action(2), InterruptAction::ForceExit);
    assert_eq!(interrupt_action(5), InterruptAction::ForceExit);
}
