//! Pipeline agent identifiers.
//!
//! Agents are the named server-side stages that report progress. Two
//! sentinel ids (`contract`, `results`) exist only to anchor the start and
//! end of the displayed workflow; the backend never reports them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a pipeline stage.
///
/// Unrecognized names are preserved in [`AgentId::Other`] so that status
/// details from newer backends are still stored, even though they have no
/// place in the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentId {
    /// Sentinel: the submitted contract.
    Contract,
    /// Static analysis tooling.
    StaticAnalyzer,
    /// Vulnerability detection.
    Analyzer,
    /// Verification of detected vulnerabilities.
    Skeptic,
    /// Exploit planning.
    Exploiter,
    /// Proof-of-concept generation.
    Generator,
    /// Exploit execution and fixing.
    Runner,
    /// Sentinel: the final analysis results.
    Results,
    /// Project context extraction; reports status details only.
    ProjectContext,
    Other(String),
}

impl AgentId {
    /// Agents in pipeline order, excluding sentinels and auxiliaries.
    pub const PIPELINE: [AgentId; 6] = [
        AgentId::StaticAnalyzer,
        AgentId::Analyzer,
        AgentId::Skeptic,
        AgentId::Exploiter,
        AgentId::Generator,
        AgentId::Runner,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            AgentId::Contract => "contract",
            AgentId::StaticAnalyzer => "static_analyzer",
            AgentId::Analyzer => "analyzer",
            AgentId::Skeptic => "skeptic",
            AgentId::Exploiter => "exploiter",
            AgentId::Generator => "generator",
            AgentId::Runner => "runner",
            AgentId::Results => "results",
            AgentId::ProjectContext => "project_context_llm",
            AgentId::Other(name) => name,
        }
    }

    /// Display-only ids that are never the target of a push event.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, AgentId::Contract | AgentId::Results)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        match value {
            "contract" => AgentId::Contract,
            "static_analyzer" => AgentId::StaticAnalyzer,
            "analyzer" => AgentId::Analyzer,
            "skeptic" => AgentId::Skeptic,
            "exploiter" => AgentId::Exploiter,
            "generator" => AgentId::Generator,
            "runner" => AgentId::Runner,
            "results" => AgentId::Results,
            "project_context_llm" => AgentId::ProjectContext,
            other => AgentId::Other(other.to_string()),
        }
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        match AgentId::from(value.as_str()) {
            AgentId::Other(_) => AgentId::Other(value),
            known => known,
        }
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        match value {
            AgentId::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
