//! Job status values and the forward-only transition rules.
//!
//! Status updates arrive from two unsynchronized sources (push events and
//! polled snapshots), so the rules here are phrased as "may this update be
//! applied on top of the current value" rather than as an explicit graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a job as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job submitted yet.
    Idle,
    /// Address-based submission accepted, source not retrieved yet.
    Fetching,
    /// Artifact uploaded and ready for analysis.
    Uploaded,
    /// Artifact retrieved by address and ready for analysis.
    Fetched,
    Analyzing,
    Completed,
    Error,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Idle,
        JobStatus::Fetching,
        JobStatus::Uploaded,
        JobStatus::Fetched,
        JobStatus::Analyzing,
        JobStatus::Completed,
        JobStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Fetching => "fetching",
            JobStatus::Uploaded => "uploaded",
            JobStatus::Fetched => "fetched",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// `completed` and `error` are never left once entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Statuses during which the poll loop keeps checking the backend.
    pub fn is_pollable(self) -> bool {
        matches!(
            self,
            JobStatus::Fetching | JobStatus::Uploaded | JobStatus::Fetched | JobStatus::Analyzing
        )
    }

    /// Whether an analysis may be started from this status.
    pub fn is_ready_for_analysis(self) -> bool {
        matches!(self, JobStatus::Uploaded | JobStatus::Fetched)
    }

    /// Position in the lifecycle. Updates never move to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Idle => 0,
            JobStatus::Fetching => 1,
            JobStatus::Uploaded | JobStatus::Fetched => 2,
            JobStatus::Analyzing => 3,
            JobStatus::Completed | JobStatus::Error => 4,
        }
    }

    /// Check whether `next` may be applied on top of `self`.
    ///
    /// Re-applying the current value is always allowed (it is a no-op).
    /// Terminal statuses accept nothing else, and lower ranks are stale.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    /// Like [`can_advance_to`](Self::can_advance_to) but with an error
    /// naming both ends of the rejected transition.
    pub fn validate_advance(self, next: JobStatus) -> Result<(), CoreError> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}
