//! Push event names as they appear on the wire.
//!
//! Every payload carries a `job_id`; see the client crate's message types
//! for the remaining fields.

/// Analysis pipeline began running.
pub const EVENT_ANALYSIS_STARTED: &str = "analysis_started";

/// A stage started executing.
pub const EVENT_AGENT_ACTIVE: &str = "agent_active";

/// A stage finished, optionally with a result payload.
pub const EVENT_AGENT_COMPLETE: &str = "agent_complete";

/// Free-form status detail from a stage.
pub const EVENT_AGENT_STATUS: &str = "agent_status";

/// Retrieval-context snippets used by the detection stage.
pub const EVENT_RAG_DETAILS: &str = "rag_details";

/// Project-level context insights.
pub const EVENT_PROJECT_CONTEXT_INSIGHTS: &str = "project_context_insights";

/// Pipeline finished; results are available from the results endpoint.
pub const EVENT_ANALYSIS_COMPLETE: &str = "analysis_complete";

/// Pipeline failed.
pub const EVENT_ANALYSIS_ERROR: &str = "analysis_error";

/// Address-based submission retrieved the contract source.
pub const EVENT_CONTRACT_FETCHED: &str = "contract_fetched";

/// Address-based submission failed to retrieve the contract source.
pub const EVENT_CONTRACT_FETCH_ERROR: &str = "contract_fetch_error";
