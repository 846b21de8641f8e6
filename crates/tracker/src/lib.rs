//! Client-side lifecycle tracker for long-running analysis jobs.
//!
//! Keeps a single consistent view of one job's progress while updates
//! arrive from two unsynchronized sources: push events delivered through
//! an [`EventChannel`](auditwatch_client::EventChannel) and a periodic
//! status poll against the REST API.
//!
//! - [`JobSession`] - identity of the active job; the staleness filter.
//! - [`StateStore`] - canonical state both sources write into.
//! - [`reconcile`] - maps push events onto store mutations.
//! - [`PollLoop`] - cancellable status poll with a one-shot results fetch.
//! - [`Tracker`] - wires the pieces together and owns their lifetimes.

pub mod config;
pub mod error;
pub mod notify;
pub mod poll;
pub mod reconcile;
pub mod results;
pub mod session;
pub mod store;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use error::TrackerError;
pub use notify::{Notifier, TrackerEvent};
pub use poll::{PollDeps, PollLoop, PollSettings, PollStopReason};
pub use reconcile::{apply_push_event, Effects};
pub use results::{ResultsFetcher, ResultsOutcome};
pub use session::{JobSession, SessionTicket};
pub use store::{
    AgentRecord, ResultsState, StateStore, StatusSource, StatusUpdate, TrackerSnapshot, Update,
};
pub use tracker::Tracker;
