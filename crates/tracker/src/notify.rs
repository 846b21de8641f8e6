//! Tracker notifications backed by a `tokio::sync::broadcast` channel.
//!
//! [`Notifier`] fans out every [`TrackerEvent`] to any number of
//! subscribers. It only reports what the store accepted: stale and
//! rejected signals never produce a notification.

use auditwatch_core::{AgentId, JobId, JobStatus};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::poll::PollStopReason;
use crate::store::StatusSource;

// ---------------------------------------------------------------------------
// TrackerEvent
// ---------------------------------------------------------------------------

/// A change to the tracked job's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A new job became the active job.
    JobSubmitted {
        job_id: JobId,
        display_name: String,
        status: JobStatus,
    },

    StatusChanged {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
        source: StatusSource,
    },

    AgentActivated { job_id: JobId, agent: AgentId },

    AgentCompleted { job_id: JobId, agent: AgentId },

    /// Free-form status detail from an agent.
    AgentStatus {
        job_id: JobId,
        agent: AgentId,
        status: String,
        detail: Option<String>,
    },

    /// Retrieval or project-context details were replaced.
    ContextUpdated { job_id: JobId },

    ResultsReady { job_id: JobId },

    /// The job completed but its results could not be fetched.
    ResultsUnavailable { job_id: JobId, reason: String },

    /// The poll loop for `job_id` exited.
    PollStopped {
        job_id: JobId,
        reason: PollStopReason,
    },
}

impl TrackerEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            TrackerEvent::JobSubmitted { job_id, .. }
            | TrackerEvent::StatusChanged { job_id, .. }
            | TrackerEvent::AgentActivated { job_id, .. }
            | TrackerEvent::AgentCompleted { job_id, .. }
            | TrackerEvent::AgentStatus { job_id, .. }
            | TrackerEvent::ContextUpdated { job_id }
            | TrackerEvent::ResultsReady { job_id }
            | TrackerEvent::ResultsUnavailable { job_id, .. }
            | TrackerEvent::PollStopped { job_id, .. } => job_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of [`TrackerEvent`]s.
///
/// Slow receivers observe `RecvError::Lagged` once the buffer fills; the
/// store remains the source of truth and can be re-read at any time.
pub struct Notifier {
    sender: broadcast::Sender<TrackerEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: TrackerEvent) {
        // Zero receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = TrackerEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
