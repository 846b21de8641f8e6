//! Periodic status poll.
//!
//! A [`PollLoop`] is bound to one [`SessionTicket`]. On every tick it asks
//! the status endpoint for the job's authoritative status and writes the
//! answer into the store. It stops by itself once the job is terminal
//! (fetching results first when the job completed) or once its ticket is
//! superseded.
//!
//! Requests are awaited inline, so at most one is outstanding at a time.
//! Ticks that fall due while a request is running are skipped rather than
//! queued, and every request is bounded by a timeout so a stalled call
//! cannot hold the loop forever.

use std::sync::Arc;
use std::time::Duration;

use auditwatch_client::JobApi;
use auditwatch_core::JobStatus;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::notify::{Notifier, TrackerEvent};
use crate::results::ResultsFetcher;
use crate::session::SessionTicket;
use crate::store::{StateStore, StatusSource, StatusUpdate};

/// Why a poll loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStopReason {
    /// The poll observed `completed` and ran the results fetch.
    Completed,
    /// The poll observed `error`.
    Failed,
    /// The job reached a terminal status through another path.
    Terminal,
    /// A newer submission replaced the loop's job.
    Superseded,
    Cancelled,
}

/// Timing for a poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
}

/// Everything a running loop writes through.
#[derive(Clone)]
pub struct PollDeps {
    pub store: Arc<StateStore>,
    pub api: Arc<dyn JobApi>,
    pub notifier: Arc<Notifier>,
    pub results: ResultsFetcher,
}

/// Handle to a running poll task.
pub struct PollLoop {
    ticket: SessionTicket,
    handle: JoinHandle<PollStopReason>,
    cancel: CancellationToken,
    /// Cancels the loop when the handle is dropped.
    _guard: DropGuard,
}

impl PollLoop {
    /// Spawn a loop for `ticket` on `runtime`.
    ///
    /// The first status request is made one interval after spawning.
    pub fn spawn(
        runtime: &Handle,
        ticket: SessionTicket,
        deps: PollDeps,
        settings: PollSettings,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_ticket = ticket.clone();

        let handle = runtime.spawn(async move {
            tracing::info!(
                job_id = %task_ticket.job_id,
                interval_ms = settings.interval.as_millis() as u64,
                "Poll loop started",
            );
            let reason = run_poll_loop(&task_ticket, &deps, settings, &task_cancel).await;
            tracing::info!(job_id = %task_ticket.job_id, reason = ?reason, "Poll loop stopped");
            deps.notifier.publish(TrackerEvent::PollStopped {
                job_id: task_ticket.job_id.clone(),
                reason,
            });
            reason
        });

        Self {
            ticket,
            handle,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    pub fn ticket(&self) -> &SessionTicket {
        &self.ticket
    }

    /// Request the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// The task is aborted if it does not exit within `timeout`.
    pub async fn stop(self, timeout: Duration) -> Option<PollStopReason> {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(reason)) => Some(reason),
            Ok(Err(e)) => {
                tracing::warn!(
                    job_id = %self.ticket.job_id,
                    error = %e,
                    "Poll task ended abnormally",
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %self.ticket.job_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Poll task did not exit in time, aborting",
                );
                abort.abort();
                None
            }
        }
    }
}

async fn run_poll_loop(
    ticket: &SessionTicket,
    deps: &PollDeps,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> PollStopReason {
    let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PollStopReason::Cancelled,
            _ = ticker.tick() => {}
        }

        match deps.store.status_for(ticket) {
            None => return PollStopReason::Superseded,
            Some(status) if status.is_terminal() => return PollStopReason::Terminal,
            Some(_) => {}
        }

        let request =
            tokio::time::timeout(settings.request_timeout, deps.api.status(&ticket.job_id));
        let response = tokio::select! {
            _ = cancel.cancelled() => return PollStopReason::Cancelled,
            response = request => response,
        };

        let polled = match response {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                tracing::warn!(job_id = %ticket.job_id, error = %e, "Status poll failed");
                continue;
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %ticket.job_id,
                    timeout_ms = settings.request_timeout.as_millis() as u64,
                    "Status poll timed out",
                );
                continue;
            }
        };

        let update = deps
            .store
            .set_status_for(ticket, polled, StatusSource::Poll);
        match update {
            StatusUpdate::Stale => return PollStopReason::Superseded,
            StatusUpdate::Changed { from, to } => {
                deps.notifier.publish(TrackerEvent::StatusChanged {
                    job_id: ticket.job_id.clone(),
                    from,
                    to,
                    source: StatusSource::Poll,
                })
            }
            StatusUpdate::Unchanged | StatusUpdate::Rejected { .. } => {}
        }

        // The store's status wins over the polled one: a rejected update
        // means another path already decided the outcome.
        match deps.store.status_for(ticket) {
            None => return PollStopReason::Superseded,
            Some(JobStatus::Completed) => {
                // Cancelling drops the fetch, which releases its claim.
                tokio::select! {
                    _ = cancel.cancelled() => return PollStopReason::Cancelled,
                    _ = deps.results.fetch_once(ticket) => {}
                }
                return PollStopReason::Completed;
            }
            Some(JobStatus::Error) => return PollStopReason::Failed,
            Some(_) => {}
        }
    }
}
