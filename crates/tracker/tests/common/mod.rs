//! Shared test doubles for the tracker integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use auditwatch_client::{ApiError, JobApi, LocalEventChannel, PushEvent};
use auditwatch_core::{AnalysisOptions, AnalysisResults, Job, JobId, JobStatus};
use auditwatch_tracker::{Tracker, TrackerConfig, TrackerEvent};
use tokio::sync::broadcast;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Scripted stand-in for the REST backend.
///
/// Status and results requests answer after an optional delay with the
/// currently configured status or a fixed results payload. Failures are
/// consumed one call at a time.
#[derive(Default)]
pub struct FakeApi {
    status: Mutex<Option<JobStatus>>,
    status_delay: Mutex<Duration>,
    results_delay: Mutex<Duration>,
    status_failures: AtomicUsize,
    results_failures: AtomicUsize,
    start_failures: AtomicUsize,

    pub status_calls: Mutex<Vec<JobId>>,
    pub results_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new(status: JobStatus) -> Arc<Self> {
        let api = Self::default();
        *api.status.lock().unwrap() = Some(status);
        Arc::new(api)
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    pub fn set_results_delay(&self, delay: Duration) {
        *self.results_delay.lock().unwrap() = delay;
    }

    pub fn fail_status(&self, times: usize) {
        self.status_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_results(&self, times: usize) {
        self.results_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_start(&self, times: usize) {
        self.start_failures.store(times, Ordering::SeqCst);
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn results_call_count(&self) -> usize {
        self.results_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "service unavailable".into(),
        }
    }
}

#[async_trait]
impl JobApi for FakeApi {
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        self.status_calls.lock().unwrap().push(job_id.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if Self::take_failure(&self.status_failures) {
            return Err(Self::unavailable());
        }
        Ok(self.status.lock().unwrap().unwrap_or(JobStatus::Idle))
    }

    async fn results(&self, _job_id: &JobId) -> Result<AnalysisResults, ApiError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.results_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.results_failures) {
            return Err(Self::unavailable());
        }
        Ok(AnalysisResults::new(serde_json::json!({
            "rechecked_vulnerabilities": [{"vulnerability_type": "reentrancy"}],
            "generated_pocs": [],
        })))
    }

    async fn start_analysis(
        &self,
        _job_id: &JobId,
        _options: &AnalysisOptions,
    ) -> Result<(), ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.start_failures) {
            return Err(Self::unavailable());
        }
        Ok(())
    }
}

pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval: POLL_INTERVAL,
        request_timeout: Duration::from_secs(30),
        shutdown_timeout: Duration::from_secs(5),
        ..TrackerConfig::default()
    }
}

pub struct Harness {
    pub channel: Arc<LocalEventChannel>,
    pub api: Arc<FakeApi>,
    pub tracker: Arc<Tracker>,
    pub events: broadcast::Receiver<TrackerEvent>,
}

impl Harness {
    pub async fn start(api: Arc<FakeApi>) -> Self {
        let channel = Arc::new(LocalEventChannel::new());
        let tracker = Tracker::start(channel.clone(), api.clone(), test_config())
            .await
            .expect("tracker should start");
        let events = tracker.subscribe();
        Self {
            channel,
            api,
            tracker,
            events,
        }
    }

    pub fn push(&self, frame: &str) {
        let parsed = self.channel.deliver_frame(frame);
        parsed.expect("test frame should parse");
    }

    pub fn push_event(&self, event: &PushEvent) {
        self.channel.deliver(event);
    }

    /// Drain every notification published so far.
    pub fn drain(&mut self) -> Vec<TrackerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn job(id: &str, status: JobStatus) -> Job {
    Job::new(id, format!("{id}.sol"), status)
}

/// Let spawned tasks run without reaching the next poll tick.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Sleep just past `n` poll intervals.
pub async fn ticks(n: u32) {
    tokio::time::sleep(POLL_INTERVAL * n + Duration::from_millis(100)).await;
}

pub fn frame(event: &str, data: serde_json::Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

/// Frame for an event that carries only the job id.
pub fn job_event(event: &str, job_id: &str) -> String {
    frame(event, serde_json::json!({ "job_id": job_id }))
}

/// Frame for an agent lifecycle event.
pub fn agent_event(event: &str, job_id: &str, agent: &str) -> String {
    let data = serde_json::json!({ "job_id": job_id, "agent": agent });
    frame(event, data)
}
