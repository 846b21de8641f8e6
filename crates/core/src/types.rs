use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque server-assigned job identifier.
///
/// The backend hands out UUID strings today, but nothing here relies on
/// that; ids are only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One submitted artifact's analysis run.
///
/// Created by a submission (upload or address fetch). Only `status`
/// changes afterwards; a new submission produces a new `Job` rather than
/// mutating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// File name or contract address shown to the user.
    pub display_name: String,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<JobId>, display_name: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status,
        }
    }
}
