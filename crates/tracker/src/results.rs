//! One-shot results fetch.
//!
//! Whichever path first sees the job `completed` (push or poll) claims
//! the fetch in the store; every later attempt finds it claimed and does
//! nothing. A failed fetch leaves the job `completed` with results
//! marked unavailable until the consumer explicitly retries.

use std::sync::Arc;
use std::time::Duration;

use auditwatch_client::JobApi;

use crate::notify::{Notifier, TrackerEvent};
use crate::session::SessionTicket;
use crate::store::{StateStore, Update};

/// Outcome of a results fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsOutcome {
    Ready,
    /// The request failed or timed out.
    Unavailable(String),
    /// Another path already fetched (or is fetching) the results.
    AlreadyClaimed,
    /// The job was superseded while the request was in flight.
    Stale,
}

/// Fetches results into the store and reports the outcome.
#[derive(Clone)]
pub struct ResultsFetcher {
    store: Arc<StateStore>,
    api: Arc<dyn JobApi>,
    notifier: Arc<Notifier>,
    request_timeout: Duration,
}

impl ResultsFetcher {
    pub fn new(
        store: Arc<StateStore>,
        api: Arc<dyn JobApi>,
        notifier: Arc<Notifier>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            api,
            notifier,
            request_timeout,
        }
    }

    /// Fetch results for `ticket`'s submission unless a fetch was already
    /// claimed.
    pub async fn fetch_once(&self, ticket: &SessionTicket) -> ResultsOutcome {
        if !self.store.claim_results_fetch(ticket) {
            return ResultsOutcome::AlreadyClaimed;
        }
        self.run(ticket).await
    }

    /// Retry a fetch that previously ended unavailable.
    pub async fn retry(&self, ticket: &SessionTicket) -> ResultsOutcome {
        if !self.store.claim_results_retry(ticket) {
            return ResultsOutcome::AlreadyClaimed;
        }
        self.run(ticket).await
    }

    // ---- private helpers ----

    /// Run a claimed fetch. If this future is dropped before it resolves
    /// the claim is released, so the fetch can be requested again.
    async fn run(&self, ticket: &SessionTicket) -> ResultsOutcome {
        let job_id = &ticket.job_id;
        let mut claim = ClaimGuard {
            store: self.store.as_ref(),
            ticket,
            settled: false,
        };
        tracing::info!(job_id = %job_id, "Fetching analysis results");

        let request = tokio::time::timeout(self.request_timeout, self.api.results(job_id));
        let reason = match request.await {
            Ok(Ok(results)) => {
                claim.settled = true;
                return match self.store.store_results_for(ticket, results) {
                    Update::Stale => ResultsOutcome::Stale,
                    _ => {
                        tracing::info!(job_id = %job_id, "Analysis results ready");
                        self.notifier.publish(TrackerEvent::ResultsReady {
                            job_id: job_id.clone(),
                        });
                        ResultsOutcome::Ready
                    }
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "results request timed out after {}s",
                self.request_timeout.as_secs()
            ),
        };
        claim.settled = true;

        tracing::warn!(job_id = %job_id, error = %reason, "Results fetch failed");
        let update = self
            .store
            .mark_results_unavailable_for(ticket, reason.clone());
        match update {
            Update::Stale => ResultsOutcome::Stale,
            _ => {
                self.notifier.publish(TrackerEvent::ResultsUnavailable {
                    job_id: job_id.clone(),
                    reason: reason.clone(),
                });
                ResultsOutcome::Unavailable(reason)
            }
        }
    }
}

/// Releases an unsettled results claim on drop.
struct ClaimGuard<'a> {
    store: &'a StateStore,
    ticket: &'a SessionTicket,
    settled: bool,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.store.release_results_claim(self.ticket).is_applied() {
            tracing::info!(job_id = %self.ticket.job_id, "Results fetch abandoned");
        }
    }
}
