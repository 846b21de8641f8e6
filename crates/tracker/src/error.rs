use std::time::Duration;

use auditwatch_client::{ApiError, ChannelError};
use auditwatch_core::{CoreError, JobId, JobStatus};

/// Errors returned by [`Tracker`](crate::Tracker) operations.
///
/// Stale signals, poll failures and results-fetch failures are recovered
/// inside the tracker and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The operation needs a submitted job.
    #[error("No active job")]
    NoActiveJob,

    /// Analysis can only start from `uploaded` or `fetched`.
    #[error("Job {job_id} is not ready for analysis (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    /// Results can only be fetched for a `completed` job.
    #[error("Results are not available while the job is {status}")]
    ResultsNotReady { status: JobStatus },

    /// A request did not complete within the configured bound.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid analysis options.
    #[error(transparent)]
    Options(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
