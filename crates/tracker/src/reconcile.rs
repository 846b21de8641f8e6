//! Push-event reconciliation.
//!
//! [`apply_push_event`] maps one [`PushEvent`] onto the store mutations it
//! implies and reports what the caller has to do next (publish
//! notifications, stop polling, fetch results). It performs no I/O, so
//! the same event can be applied any number of times and in any order
//! relative to poll responses.

use auditwatch_client::PushEvent;
use auditwatch_core::{JobId, JobStatus};

use crate::notify::TrackerEvent;
use crate::store::{StateStore, StatusSource, StatusUpdate, Update};

/// Follow-up work produced by applying one push event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    /// The event belonged to a job that is no longer active.
    pub stale: bool,
    pub notifications: Vec<TrackerEvent>,
    /// This event moved the job into a terminal status.
    pub entered_terminal: bool,
    /// The job is `completed`; the caller should make sure results are
    /// fetched. The store decides whether a fetch is still needed.
    pub fetch_results: bool,
    /// The job moved into a status the poll loop covers.
    pub resume_polling: bool,
}

impl Effects {
    fn stale() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }
}

/// Apply `event` to `store`.
pub fn apply_push_event(store: &StateStore, event: &PushEvent) -> Effects {
    let job_id = event.job_id();
    if !store.accepts(job_id) {
        tracing::debug!(
            event = %event.kind(),
            job_id = %job_id,
            "Discarding push event for inactive job",
        );
        return Effects::stale();
    }

    match event {
        PushEvent::AnalysisStarted(data) => apply_status(store, &data.job_id, JobStatus::Analyzing),
        PushEvent::ContractFetched(data) => apply_status(store, &data.job_id, JobStatus::Fetched),
        PushEvent::AnalysisComplete(data) => {
            let mut effects = apply_status(store, &data.job_id, JobStatus::Completed);
            effects.fetch_results = !effects.stale && store.status() == JobStatus::Completed;
            effects
        }
        PushEvent::AnalysisError(data) | PushEvent::ContractFetchError(data) => {
            if let Some(error) = &data.error {
                tracing::warn!(
                    job_id = %data.job_id,
                    event = %event.kind(),
                    error = %error,
                    "Backend reported failure",
                );
            }
            apply_status(store, &data.job_id, JobStatus::Error)
        }
        PushEvent::AgentActive(data) => {
            let update = store.set_active_agent(&data.job_id, data.agent.clone());
            agent_effects(update, || TrackerEvent::AgentActivated {
                job_id: data.job_id.clone(),
                agent: data.agent.clone(),
            })
        }
        PushEvent::AgentComplete(data) => {
            let update =
                store.complete_agent(&data.job_id, data.agent.clone(), data.result.clone());
            agent_effects(update, || TrackerEvent::AgentCompleted {
                job_id: data.job_id.clone(),
                agent: data.agent.clone(),
            })
        }
        PushEvent::AgentStatus(data) => {
            let update = store.upsert_agent_status(
                &data.job_id,
                data.agent.clone(),
                data.status.clone(),
                data.detail.clone(),
            );
            agent_effects(update, || TrackerEvent::AgentStatus {
                job_id: data.job_id.clone(),
                agent: data.agent.clone(),
                status: data.status.clone(),
                detail: data.detail.clone(),
            })
        }
        PushEvent::RagDetails(data) => {
            let details = data.details.clone().unwrap_or_default();
            let update = store.replace_rag_details(&data.job_id, details);
            context_effects(update, &data.job_id)
        }
        PushEvent::ProjectContextInsights(data) => {
            let details = data.details.clone().unwrap_or_default();
            let update = store.replace_project_context(&data.job_id, details);
            context_effects(update, &data.job_id)
        }
    }
}

// ---- private helpers ----

fn apply_status(store: &StateStore, job_id: &JobId, status: JobStatus) -> Effects {
    let update = store.set_status(job_id, status, StatusSource::Push);
    match update {
        StatusUpdate::Stale => Effects::stale(),
        StatusUpdate::Changed { from, to } => Effects {
            notifications: vec![TrackerEvent::StatusChanged {
                job_id: job_id.clone(),
                from,
                to,
                source: StatusSource::Push,
            }],
            entered_terminal: update.entered_terminal(),
            resume_polling: to.is_pollable(),
            ..Effects::default()
        },
        StatusUpdate::Unchanged | StatusUpdate::Rejected { .. } => Effects::default(),
    }
}

fn agent_effects(update: Update, notification: impl FnOnce() -> TrackerEvent) -> Effects {
    match update {
        Update::Stale => Effects::stale(),
        Update::Applied => Effects {
            notifications: vec![notification()],
            ..Effects::default()
        },
        Update::Unchanged => Effects::default(),
    }
}

fn context_effects(update: Update, job_id: &JobId) -> Effects {
    agent_effects(update, || TrackerEvent::ContextUpdated {
        job_id: job_id.clone(),
    })
}
