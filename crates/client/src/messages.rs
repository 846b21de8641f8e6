//! Push event types and parser.
//!
//! The backend sends JSON text frames with the shape
//! `{"event": "<name>", "data": {...}}`. This module deserializes them
//! into a strongly-typed [`PushEvent`] enum. Every payload carries the
//! `job_id` it belongs to.

use std::fmt;

use auditwatch_core::event_names::*;
use auditwatch_core::{AgentId, JobId};
use serde::{Deserialize, Serialize};

/// All known push events.
///
/// Deserialized via the adjacently-tagged `"event"` field with associated
/// `"data"` content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    /// The analysis pipeline began running.
    AnalysisStarted(JobRef),

    /// A stage started executing.
    AgentActive(AgentActiveData),

    /// A stage finished.
    AgentComplete(AgentCompleteData),

    /// Free-form status detail from a stage.
    AgentStatus(AgentStatusData),

    /// Retrieval-context snippets; replaces any previous set.
    RagDetails(RagDetailsData),

    /// Project-context insights; replaces any previous set.
    ProjectContextInsights(ProjectContextData),

    /// The pipeline finished and results can be fetched.
    AnalysisComplete(AnalysisCompleteData),

    /// The pipeline failed.
    AnalysisError(ErrorData),

    /// The contract source was retrieved for an address submission.
    ContractFetched(JobRef),

    /// Retrieving the contract source failed.
    ContractFetchError(ErrorData),
}

/// Payload that carries only the job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub job_id: JobId,
}

/// Payload for `agent_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActiveData {
    pub job_id: JobId,
    pub agent: AgentId,
}

/// Payload for `agent_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCompleteData {
    pub job_id: JobId,
    pub agent: AgentId,
    /// Stage output, when the backend chooses to include it.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Payload for `agent_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusData {
    pub job_id: JobId,
    pub agent: AgentId,
    pub status: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Payload for `rag_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDetailsData {
    pub job_id: JobId,
    /// `null` and a missing field both mean "no snippets".
    #[serde(default)]
    pub details: Option<Vec<serde_json::Value>>,
}

/// Payload for `project_context_insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContextData {
    pub job_id: JobId,
    #[serde(default)]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Payload for `analysis_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCompleteData {
    pub job_id: JobId,
    #[serde(default)]
    pub vulnerabilities_count: Option<u64>,
    #[serde(default)]
    pub pocs_count: Option<u64>,
}

/// Payload for `analysis_error` and `contract_fetch_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub job_id: JobId,
    /// Human-readable error description.
    #[serde(default)]
    pub error: Option<String>,
}

/// Event names without payloads, used as subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AnalysisStarted,
    AgentActive,
    AgentComplete,
    AgentStatus,
    RagDetails,
    ProjectContextInsights,
    AnalysisComplete,
    AnalysisError,
    ContractFetched,
    ContractFetchError,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::AnalysisStarted,
        EventKind::AgentActive,
        EventKind::AgentComplete,
        EventKind::AgentStatus,
        EventKind::RagDetails,
        EventKind::ProjectContextInsights,
        EventKind::AnalysisComplete,
        EventKind::AnalysisError,
        EventKind::ContractFetched,
        EventKind::ContractFetchError,
    ];

    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::AnalysisStarted => EVENT_ANALYSIS_STARTED,
            EventKind::AgentActive => EVENT_AGENT_ACTIVE,
            EventKind::AgentComplete => EVENT_AGENT_COMPLETE,
            EventKind::AgentStatus => EVENT_AGENT_STATUS,
            EventKind::RagDetails => EVENT_RAG_DETAILS,
            EventKind::ProjectContextInsights => EVENT_PROJECT_CONTEXT_INSIGHTS,
            EventKind::AnalysisComplete => EVENT_ANALYSIS_COMPLETE,
            EventKind::AnalysisError => EVENT_ANALYSIS_ERROR,
            EventKind::ContractFetched => EVENT_CONTRACT_FETCHED,
            EventKind::ContractFetchError => EVENT_CONTRACT_FETCH_ERROR,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::AnalysisStarted(_) => EventKind::AnalysisStarted,
            PushEvent::AgentActive(_) => EventKind::AgentActive,
            PushEvent::AgentComplete(_) => EventKind::AgentComplete,
            PushEvent::AgentStatus(_) => EventKind::AgentStatus,
            PushEvent::RagDetails(_) => EventKind::RagDetails,
            PushEvent::ProjectContextInsights(_) => EventKind::ProjectContextInsights,
            PushEvent::AnalysisComplete(_) => EventKind::AnalysisComplete,
            PushEvent::AnalysisError(_) => EventKind::AnalysisError,
            PushEvent::ContractFetched(_) => EventKind::ContractFetched,
            PushEvent::ContractFetchError(_) => EventKind::ContractFetchError,
        }
    }

    /// The job this event belongs to.
    pub fn job_id(&self) -> &JobId {
        match self {
            PushEvent::AnalysisStarted(d) | PushEvent::ContractFetched(d) => &d.job_id,
            PushEvent::AgentActive(d) => &d.job_id,
            PushEvent::AgentComplete(d) => &d.job_id,
            PushEvent::AgentStatus(d) => &d.job_id,
            PushEvent::RagDetails(d) => &d.job_id,
            PushEvent::ProjectContextInsights(d) => &d.job_id,
            PushEvent::AnalysisComplete(d) => &d.job_id,
            PushEvent::AnalysisError(d) | PushEvent::ContractFetchError(d) => &d.job_id,
        }
    }

    /// Encode as a wire frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parse a push-channel text frame into a typed event.
///
/// Returns `Err` for malformed JSON or unknown event names.
/// Callers should log and continue.
pub fn parse_message(text: &str) -> Result<PushEvent, serde_json::Error> {
    serde_json::from_str(text)
}
