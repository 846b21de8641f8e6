//! The tracking engine.
//!
//! [`Tracker`] owns one job session at a time. It registers a handler for
//! every push event kind on the injected [`EventChannel`], runs a
//! [`PollLoop`] while the job is in a pollable status and makes sure the
//! results of a completed job are fetched exactly once. Consumers read
//! the state through [`Tracker::snapshot`] or react to the
//! [`TrackerEvent`]s returned by [`Tracker::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use auditwatch_client::{EventChannel, EventKind, JobApi, PushEvent, SubscriptionId};
use auditwatch_core::{AnalysisOptions, Job, JobId, JobStatus, WorkflowView};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::notify::{Notifier, TrackerEvent};
use crate::poll::{PollDeps, PollLoop, PollSettings};
use crate::reconcile::apply_push_event;
use crate::results::{ResultsFetcher, ResultsOutcome};
use crate::session::SessionTicket;
use crate::store::{StateStore, StatusSource, StatusUpdate, TrackerSnapshot};

/// Client-side tracker for one job at a time.
///
/// Created via [`Tracker::start`]. Call [`Tracker::shutdown`] to release
/// the channel subscriptions and background tasks; dropping the tracker
/// releases them without waiting.
pub struct Tracker {
    ctx: Arc<TrackerContext>,
    channel: Arc<dyn EventChannel>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    /// Serializes submissions so only one poll loop hand-over runs at a time.
    submit_lock: tokio::sync::Mutex<()>,
}

/// State shared with push handlers and background tasks.
///
/// Holds no reference to the channel, so handlers registered on the
/// channel never keep it alive.
struct TrackerContext {
    store: Arc<StateStore>,
    api: Arc<dyn JobApi>,
    notifier: Arc<Notifier>,
    results: ResultsFetcher,
    config: TrackerConfig,
    runtime: Handle,
    poll: Mutex<Option<PollLoop>>,
    /// Results fetches started from push handlers.
    fetches: TaskTracker,
    /// Set while a submission swaps poll loops.
    handing_over: AtomicBool,
    closed: AtomicBool,
}

impl Tracker {
    /// Connect `channel` and register one handler per push event kind.
    pub async fn start(
        channel: Arc<dyn EventChannel>,
        api: Arc<dyn JobApi>,
        config: TrackerConfig,
    ) -> Result<Arc<Self>, TrackerError> {
        channel.connect().await?;

        let store = Arc::new(StateStore::new());
        let notifier = Arc::new(Notifier::default());
        let results = ResultsFetcher::new(
            Arc::clone(&store),
            Arc::clone(&api),
            Arc::clone(&notifier),
            config.request_timeout,
        );

        let ctx = Arc::new(TrackerContext {
            store,
            api,
            notifier,
            results,
            config,
            runtime: Handle::current(),
            poll: Mutex::new(None),
            fetches: TaskTracker::new(),
            handing_over: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let ctx = Arc::clone(&ctx);
                let handler = Arc::new(move |event: &PushEvent| ctx.on_push_event(event));
                channel.subscribe(kind, handler)
            })
            .collect::<Vec<_>>();

        tracing::info!(handlers = subscriptions.len(), "Tracker started");

        Ok(Arc::new(Self {
            ctx,
            channel,
            subscriptions: Mutex::new(subscriptions),
            submit_lock: tokio::sync::Mutex::new(()),
        }))
    }

    /// Make `job` the active job.
    ///
    /// Every field of the previous job is reset in one step, so its
    /// in-flight signals are discarded from here on. The previous poll
    /// loop is stopped before a new one starts.
    pub async fn submit(&self, job: Job) -> SessionTicket {
        let _guard = self.submit_lock.lock().await;

        self.ctx.handing_over.store(true, Ordering::SeqCst);
        let ticket = self.ctx.store.reset(job.clone());
        let previous = self.ctx.poll_slot().take();
        if let Some(previous) = previous {
            previous.stop(self.ctx.config.shutdown_timeout).await;
        }
        self.ctx.handing_over.store(false, Ordering::SeqCst);

        tracing::info!(
            job_id = %job.id,
            display_name = %job.display_name,
            status = %job.status,
            "Job submitted",
        );
        self.ctx.notifier.publish(TrackerEvent::JobSubmitted {
            job_id: job.id,
            display_name: job.display_name,
            status: job.status,
        });
        self.ctx.ensure_polling();
        ticket
    }

    /// Ask the backend to start analysing the active job.
    ///
    /// Only allowed while the job is `uploaded` or `fetched`. On
    /// acknowledgement the job moves to `analyzing`.
    pub async fn start_analysis(&self, options: &AnalysisOptions) -> Result<(), TrackerError> {
        options.validate()?;

        let store = &self.ctx.store;
        let ticket = store.current_ticket().ok_or(TrackerError::NoActiveJob)?;
        let status = store.status_for(&ticket).ok_or(TrackerError::NoActiveJob)?;
        if !status.is_ready_for_analysis() {
            return Err(TrackerError::NotReady {
                job_id: ticket.job_id,
                status,
            });
        }

        let timeout = self.ctx.config.request_timeout;
        let request = self.ctx.api.start_analysis(&ticket.job_id, options);
        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| TrackerError::Timeout(timeout))??;

        let update = store.set_status_for(&ticket, JobStatus::Analyzing, StatusSource::Local);
        if let StatusUpdate::Changed { from, to } = update {
            self.ctx.notifier.publish(TrackerEvent::StatusChanged {
                job_id: ticket.job_id.clone(),
                from,
                to,
                source: StatusSource::Local,
            });
        }
        self.ctx.ensure_polling();
        Ok(())
    }

    /// Fetch results for the completed active job.
    ///
    /// Runs the fetch if nothing has claimed it yet, or retries one that
    /// ended unavailable. Returns [`ResultsOutcome::AlreadyClaimed`] while
    /// a fetch is in flight or once results are ready.
    pub async fn refresh_results(&self) -> Result<ResultsOutcome, TrackerError> {
        let store = &self.ctx.store;
        let ticket = store.current_ticket().ok_or(TrackerError::NoActiveJob)?;
        let status = store.status_for(&ticket).ok_or(TrackerError::NoActiveJob)?;
        if status != JobStatus::Completed {
            return Err(TrackerError::ResultsNotReady { status });
        }

        Ok(match self.ctx.results.fetch_once(&ticket).await {
            ResultsOutcome::AlreadyClaimed => self.ctx.results.retry(&ticket).await,
            outcome => outcome,
        })
    }

    /// Forget the active job and stop polling for it.
    ///
    /// Every signal that arrives afterwards is stale until the next
    /// submission.
    pub async fn end_session(&self) {
        let _guard = self.submit_lock.lock().await;
        self.ctx.store.clear();
        let poll = self.ctx.poll_slot().take();
        if let Some(poll) = poll {
            poll.stop(self.ctx.config.shutdown_timeout).await;
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.ctx.store.snapshot()
    }

    pub fn workflow(&self) -> WorkflowView {
        self.ctx.store.workflow()
    }

    pub fn status(&self) -> JobStatus {
        self.ctx.store.status()
    }

    pub fn current_job(&self) -> Option<Job> {
        self.ctx.store.current_job()
    }

    /// Subscribe to tracker notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.ctx.notifier.subscribe()
    }

    /// Whether a poll loop is running for the active job.
    pub fn is_polling(&self) -> bool {
        let Some(ticket) = self.ctx.store.current_ticket() else {
            return false;
        };
        match self.ctx.poll_slot().as_ref() {
            Some(poll) => poll.ticket() == &ticket && !poll.is_finished(),
            None => false,
        }
    }

    /// Unregister every handler, stop background tasks and disconnect the
    /// channel.
    ///
    /// State stays readable afterwards.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down tracker");
        self.ctx.closed.store(true, Ordering::SeqCst);
        self.unsubscribe_all();

        let timeout = self.ctx.config.shutdown_timeout;
        let poll = self.ctx.poll_slot().take();
        if let Some(poll) = poll {
            poll.stop(timeout).await;
        }

        self.ctx.fetches.close();
        let fetches = tokio::time::timeout(timeout, self.ctx.fetches.wait()).await;
        if fetches.is_err() {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Results fetch did not finish in time",
            );
        }

        self.channel.disconnect().await;
        tracing::info!("Tracker shut down complete");
    }

    // ---- private helpers ----

    fn unsubscribe_all(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let ids = std::mem::take(&mut *subscriptions);
        drop(subscriptions);
        for id in ids {
            self.channel.unsubscribe(id);
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.ctx.closed.store(true, Ordering::SeqCst);
        self.unsubscribe_all();
        // Dropping the loop cancels it.
        self.ctx.poll_slot().take();
    }
}

impl TrackerContext {
    /// Entry point for every push event delivered by the channel.
    fn on_push_event(&self, event: &PushEvent) {
        let effects = apply_push_event(&self.store, event);
        if effects.stale {
            return;
        }

        self.notifier.publish_all(effects.notifications);

        let job_id = event.job_id();
        if effects.entered_terminal {
            self.cancel_poll_for(job_id);
        }
        if effects.fetch_results {
            self.spawn_results_fetch(job_id);
        }
        if effects.resume_polling {
            self.ensure_polling();
        }
    }

    /// Start a poll loop for the active job unless one is already running.
    fn ensure_polling(&self) {
        if self.closed.load(Ordering::SeqCst) || self.handing_over.load(Ordering::SeqCst) {
            return;
        }
        let Some(ticket) = self.store.current_ticket() else {
            return;
        };
        let status = self.store.status_for(&ticket);
        if !status.is_some_and(JobStatus::is_pollable) {
            return;
        }

        let mut slot = self.poll_slot();
        if slot
            .as_ref()
            .is_some_and(|poll| poll.ticket() == &ticket && !poll.is_finished())
        {
            return;
        }

        let deps = PollDeps {
            store: Arc::clone(&self.store),
            api: Arc::clone(&self.api),
            notifier: Arc::clone(&self.notifier),
            results: self.results.clone(),
        };
        let settings = PollSettings {
            interval: self.config.poll_interval,
            request_timeout: self.config.request_timeout,
        };
        *slot = Some(PollLoop::spawn(&self.runtime, ticket, deps, settings));
    }

    /// Stop polling once a push event made the job terminal.
    fn cancel_poll_for(&self, job_id: &JobId) {
        if let Some(poll) = self.poll_slot().as_ref() {
            if &poll.ticket().job_id == job_id {
                poll.cancel();
            }
        }
    }

    /// Fetch results for the submission `job_id` currently belongs to.
    fn spawn_results_fetch(&self, job_id: &JobId) {
        let Some(ticket) = self.store.current_ticket() else {
            return;
        };
        if &ticket.job_id != job_id {
            return;
        }

        let results = self.results.clone();
        self.fetches.spawn_on(
            async move {
                let outcome = results.fetch_once(&ticket).await;
                tracing::debug!(
                    job_id = %ticket.job_id,
                    outcome = ?outcome,
                    "Results fetch finished",
                );
            },
            &self.runtime,
        );
    }

    fn poll_slot(&self) -> MutexGuard<'_, Option<PollLoop>> {
        self.poll.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
