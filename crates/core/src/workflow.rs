//! Workflow step list and current-step derivation.
//!
//! The displayed workflow is a fixed, ordered list of steps. Which step is
//! "current" is never stored; it is recomputed from the tracked status,
//! active agent and completed-agent set on every read by
//! [`derive_workflow`], which is pure and deterministic.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::agent::AgentId;
use crate::status::JobStatus;

// ---------------------------------------------------------------------------
// Step list
// ---------------------------------------------------------------------------

/// One entry of the fixed display sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    pub id: AgentId,
    pub label: &'static str,
    pub description: &'static str,
}

/// Display order: input, each pipeline stage in pipeline order, results.
pub static WORKFLOW_STEPS: [WorkflowStep; 8] = [
    WorkflowStep {
        id: AgentId::Contract,
        label: "Smart Contract",
        description: "Input smart contract ready for analysis",
    },
    WorkflowStep {
        id: AgentId::StaticAnalyzer,
        label: "Static Analyzer",
        description: "Running static analysis tools",
    },
    WorkflowStep {
        id: AgentId::Analyzer,
        label: "Analyzer Agent",
        description: "Detecting potential vulnerabilities",
    },
    WorkflowStep {
        id: AgentId::Skeptic,
        label: "Skeptic Agent",
        description: "Verifying vulnerability validity",
    },
    WorkflowStep {
        id: AgentId::Exploiter,
        label: "Exploiter Agent",
        description: "Creating exploit plans",
    },
    WorkflowStep {
        id: AgentId::Generator,
        label: "Generator Agent",
        description: "Generating proof-of-concept code",
    },
    WorkflowStep {
        id: AgentId::Runner,
        label: "Runner Agent",
        description: "Testing and fixing exploits",
    },
    WorkflowStep {
        id: AgentId::Results,
        label: "Analysis Results",
        description: "Final vulnerability analysis completed",
    },
];

/// Position of `agent` in [`WORKFLOW_STEPS`], if it has one.
pub fn step_index(agent: &AgentId) -> Option<usize> {
    WORKFLOW_STEPS.iter().position(|step| &step.id == agent)
}

fn last_step_index() -> usize {
    WORKFLOW_STEPS.len() - 1
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Render status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
}

/// The signals the derivation reads.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowInputs<'a> {
    pub status: JobStatus,
    pub active_agent: Option<&'a AgentId>,
    pub completed: &'a BTreeSet<AgentId>,
}

/// A step together with its derived render status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub id: AgentId,
    pub label: &'static str,
    pub description: &'static str,
    pub status: StepStatus,
}

/// Derived workflow state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    /// `None` when no step is active (job not analyzing).
    pub current_step: Option<usize>,
    pub steps: Vec<StepView>,
    /// Share of the workflow reached, 0-100.
    pub progress_percent: u8,
}

impl WorkflowView {
    /// The step currently shown as in progress, if any.
    pub fn current(&self) -> Option<&StepView> {
        self.current_step.and_then(|i| self.steps.get(i))
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}

/// Index of the current step.
///
/// 1. `completed`: the last step.
/// 2. Anything other than `analyzing`: no step.
/// 3. `analyzing`: the active agent's step if it has one; otherwise the
///    step after the furthest completed stage; otherwise the first step.
///
/// While analyzing the result always lies within the step list.
pub fn current_step_index(inputs: &WorkflowInputs<'_>) -> Option<usize> {
    match inputs.status {
        JobStatus::Completed => return Some(last_step_index()),
        JobStatus::Analyzing => {}
        _ => return None,
    }

    if let Some(index) = inputs.active_agent.and_then(step_index) {
        return Some(index);
    }

    let furthest = inputs.completed.iter().filter_map(step_index).max();
    match furthest {
        Some(index) => Some((index + 1).min(last_step_index())),
        None => Some(0),
    }
}

/// Map the current signals onto the full step list.
pub fn derive_workflow(inputs: &WorkflowInputs<'_>) -> WorkflowView {
    let current_step = current_step_index(inputs);
    let all_completed = inputs.status == JobStatus::Completed;

    let steps = WORKFLOW_STEPS
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let status = if all_completed || inputs.completed.contains(&step.id) {
                StepStatus::Completed
            } else if current_step == Some(index) {
                StepStatus::Active
            } else {
                StepStatus::Pending
            };
            StepView {
                id: step.id.clone(),
                label: step.label,
                description: step.description,
                status,
            }
        })
        .collect();

    let progress_percent = match (inputs.status, current_step) {
        (JobStatus::Completed, _) => 100,
        (JobStatus::Analyzing, Some(index)) => (((index + 1) * 100) / WORKFLOW_STEPS.len()) as u8,
        _ => 0,
    };

    WorkflowView {
        current_step,
        steps,
        progress_percent,
    }
}
