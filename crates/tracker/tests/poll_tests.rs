//! Integration tests for [`PollLoop`] driven directly against a store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use auditwatch_core::{JobId, JobStatus};
use auditwatch_tracker::{
    Notifier, PollDeps, PollLoop, PollSettings, PollStopReason, ResultsFetcher, ResultsState,
    StateStore, StatusSource, TrackerEvent,
};
use tokio::runtime::Handle;

use common::{job, ticks, FakeApi, POLL_INTERVAL};

struct Fixture {
    store: Arc<StateStore>,
    api: Arc<FakeApi>,
    notifier: Arc<Notifier>,
}

impl Fixture {
    fn new(status: JobStatus) -> Self {
        Self {
            store: Arc::new(StateStore::new()),
            api: FakeApi::new(status),
            notifier: Arc::new(Notifier::default()),
        }
    }

    fn spawn(&self, job_id: &str, status: JobStatus) -> PollLoop {
        let ticket = self.store.reset(job(job_id, status));
        let deps = PollDeps {
            store: Arc::clone(&self.store),
            api: self.api.clone(),
            notifier: Arc::clone(&self.notifier),
            results: ResultsFetcher::new(
                Arc::clone(&self.store),
                self.api.clone(),
                Arc::clone(&self.notifier),
                Duration::from_secs(30),
            ),
        };
        let settings = PollSettings {
            interval: POLL_INTERVAL,
            request_timeout: Duration::from_secs(30),
        };
        PollLoop::spawn(&Handle::current(), ticket, deps, settings)
    }
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_and_reports_reason() {
    let fx = Fixture::new(JobStatus::Analyzing);
    let poll = fx.spawn("job-a", JobStatus::Analyzing);
    let mut rx = fx.notifier.subscribe();

    ticks(2).await;
    assert_eq!(fx.api.status_call_count(), 2);

    let reason = poll.stop(Duration::from_secs(5)).await;
    assert_eq!(reason, Some(PollStopReason::Cancelled));

    match rx.recv().await.unwrap() {
        TrackerEvent::PollStopped { job_id, reason } => {
            assert_eq!(job_id, JobId::from("job-a"));
            assert_eq!(reason, PollStopReason::Cancelled);
        }
        other => panic!("Expected PollStopped, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn superseded_loop_exits_without_writing() {
    let fx = Fixture::new(JobStatus::Error);
    let poll = fx.spawn("job-a", JobStatus::Analyzing);

    // A newer submission of the same id replaces the ticket.
    fx.store.reset(job("job-a", JobStatus::Uploaded));
    ticks(1).await;

    assert!(poll.is_finished());
    assert_eq!(fx.store.status(), JobStatus::Uploaded);
    assert_eq!(fx.api.status_call_count(), 0);
    let reason = poll.stop(Duration::from_secs(1)).await;
    assert_eq!(reason, Some(PollStopReason::Superseded));
}

#[tokio::test(start_paused = true)]
async fn loop_exits_when_job_went_terminal_elsewhere() {
    let fx = Fixture::new(JobStatus::Analyzing);
    let poll = fx.spawn("job-a", JobStatus::Analyzing);

    let store = &fx.store;
    store.set_status(&JobId::from("job-a"), JobStatus::Error, StatusSource::Push);
    ticks(1).await;

    assert_eq!(fx.api.status_call_count(), 0);
    let reason = poll.stop(Duration::from_secs(1)).await;
    assert_eq!(reason, Some(PollStopReason::Terminal));
}

#[tokio::test(start_paused = true)]
async fn completed_poll_fetches_results_once_then_stops() {
    let fx = Fixture::new(JobStatus::Completed);
    let poll = fx.spawn("job-a", JobStatus::Analyzing);

    ticks(3).await;

    assert_eq!(fx.api.status_call_count(), 1);
    assert_eq!(fx.api.results_call_count(), 1);
    assert!(fx.store.snapshot().results.is_some());
    let reason = poll.stop(Duration::from_secs(1)).await;
    assert_eq!(reason, Some(PollStopReason::Completed));
}

#[tokio::test(start_paused = true)]
async fn stopping_during_results_fetch_releases_the_claim() {
    let fx = Fixture::new(JobStatus::Completed);
    fx.api.set_results_delay(Duration::from_secs(20));
    let poll = fx.spawn("job-a", JobStatus::Analyzing);

    ticks(1).await;
    assert_eq!(fx.store.status(), JobStatus::Completed);
    assert_eq!(fx.store.results_state(), ResultsState::InFlight);

    let reason = poll.stop(Duration::from_secs(1)).await;
    assert_eq!(reason, Some(PollStopReason::Cancelled));
    assert_eq!(fx.store.results_state(), ResultsState::NotRequested);
    assert!(fx.store.snapshot().results.is_none());
    assert_eq!(fx.api.results_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_cancels_the_loop() {
    let fx = Fixture::new(JobStatus::Analyzing);
    let poll = fx.spawn("job-a", JobStatus::Analyzing);
    let mut rx = fx.notifier.subscribe();

    drop(poll);
    ticks(2).await;

    assert_eq!(fx.api.status_call_count(), 0);
    assert!(matches!(
        rx.try_recv(),
        Ok(TrackerEvent::PollStopped {
            reason: PollStopReason::Cancelled,
            ..
        })
    ));
}
