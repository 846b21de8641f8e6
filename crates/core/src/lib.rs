//! Domain types for tracking a multi-stage contract analysis job.
//!
//! This crate has no I/O. It defines job identity and status, the
//! pipeline agent identifiers, the fixed workflow step list and the
//! pure derivation that maps tracked signals onto it, plus the options
//! record sent when starting an analysis.

pub mod agent;
pub mod error;
pub mod event_names;
pub mod options;
pub mod results;
pub mod status;
pub mod types;
pub mod workflow;

pub use agent::AgentId;
pub use error::CoreError;
pub use options::{AnalysisOptions, ExportFormat};
pub use results::AnalysisResults;
pub use status::JobStatus;
pub use types::{Job, JobId, Timestamp};
pub use workflow::{derive_workflow, StepStatus, WorkflowInputs, WorkflowView, WORKFLOW_STEPS};
