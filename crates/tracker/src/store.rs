//! Canonical job state.
//!
//! [`StateStore`] owns the session and every per-job field behind one
//! lock, so the staleness check and the mutation it guards happen
//! atomically. Both writers (push handlers and the poll loop) go through
//! the methods here; each method takes the job id the signal carries and
//! returns [`Update::Stale`] without touching anything if that id is not
//! the active job.
//!
//! All mutations are idempotent: applying the same status, the same
//! completed agent or the same replacement collection twice leaves the
//! store in the same state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use auditwatch_core::workflow::{derive_workflow, WorkflowInputs, WorkflowView};
use auditwatch_core::{AgentId, AnalysisResults, Job, JobId, JobStatus, Timestamp};
use chrono::Utc;
use serde::Serialize;

use crate::session::{JobSession, SessionTicket};

// ---------------------------------------------------------------------------
// Records and outcomes
// ---------------------------------------------------------------------------

/// Latest details reported for one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub status: Option<String>,
    pub detail: Option<String>,
    /// Output attached to the agent's completion event.
    pub result: Option<serde_json::Value>,
    pub updated_at: Timestamp,
}

/// Where a status update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Submission,
    Push,
    Poll,
    /// Acknowledged request made by this client (start analysis).
    Local,
}

/// Progress of the one-shot results fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ResultsState {
    NotRequested,
    InFlight,
    Ready,
    /// The job completed but its results could not be fetched.
    Unavailable(String),
}

/// Outcome of a guarded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Applied,
    /// Accepted, but the store already held this value.
    Unchanged,
    /// The signal belongs to a job that is no longer active.
    Stale,
}

impl Update {
    pub fn is_applied(self) -> bool {
        self == Update::Applied
    }
}

/// Outcome of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Changed { from: JobStatus, to: JobStatus },
    Unchanged,
    /// Would leave a terminal status or move backwards.
    Rejected {
        current: JobStatus,
        attempted: JobStatus,
    },
    Stale,
}

impl StatusUpdate {
    /// True only for the update that moved the job into a terminal status.
    pub fn entered_terminal(self) -> bool {
        matches!(self, StatusUpdate::Changed { to, .. } if to.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct JobState {
    job: Option<Job>,
    active_agent: Option<AgentId>,
    completed: BTreeSet<AgentId>,
    /// Completed set as it stood when the job went terminal.
    frozen_completed: Option<BTreeSet<AgentId>>,
    agent_details: BTreeMap<AgentId, AgentRecord>,
    rag_details: Vec<serde_json::Value>,
    project_context: serde_json::Map<String, serde_json::Value>,
    results: Option<AnalysisResults>,
    results_state: ResultsState,
}

impl JobState {
    fn empty() -> Self {
        Self {
            job: None,
            active_agent: None,
            completed: BTreeSet::new(),
            frozen_completed: None,
            agent_details: BTreeMap::new(),
            rag_details: Vec::new(),
            project_context: serde_json::Map::new(),
            results: None,
            results_state: ResultsState::NotRequested,
        }
    }

    fn for_job(job: Job) -> Self {
        let mut state = Self::empty();
        if job.status.is_terminal() {
            state.frozen_completed = Some(BTreeSet::new());
        }
        state.job = Some(job);
        state
    }

    fn status(&self) -> JobStatus {
        self.job.as_ref().map_or(JobStatus::Idle, |job| job.status)
    }

    fn workflow(&self) -> WorkflowView {
        let status = self.status();
        let completed = match (&self.frozen_completed, status.is_terminal()) {
            (Some(frozen), true) => frozen,
            _ => &self.completed,
        };
        derive_workflow(&WorkflowInputs {
            status,
            active_agent: self.active_agent.as_ref(),
            completed,
        })
    }
}

struct StoreInner {
    session: JobSession,
    state: JobState,
}

/// Point-in-time copy of everything the store holds, plus the derived
/// workflow.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub job: Option<Job>,
    pub status: JobStatus,
    pub active_agent: Option<AgentId>,
    pub completed_agents: BTreeSet<AgentId>,
    pub agent_details: BTreeMap<AgentId, AgentRecord>,
    pub rag_details: Vec<serde_json::Value>,
    pub project_context: serde_json::Map<String, serde_json::Value>,
    pub results: Option<AnalysisResults>,
    pub results_state: ResultsState,
    pub workflow: WorkflowView,
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

pub struct StateStore {
    inner: Mutex<StoreInner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                session: JobSession::new(),
                state: JobState::empty(),
            }),
        }
    }

    /// Make `job` the active job, resetting every field in one step.
    pub fn reset(&self, job: Job) -> SessionTicket {
        let mut inner = self.lock();
        let ticket = inner.session.submit(&job);
        inner.state = JobState::for_job(job);
        ticket
    }

    /// End the session. The store returns to its initial idle state.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.session.end();
        inner.state = JobState::empty();
    }

    // ---- reads ----

    pub fn status(&self) -> JobStatus {
        self.lock().state.status()
    }

    pub fn current_job(&self) -> Option<Job> {
        self.lock().state.job.clone()
    }

    pub fn current_ticket(&self) -> Option<SessionTicket> {
        self.lock().session.current_ticket().cloned()
    }

    pub fn accepts(&self, job_id: &JobId) -> bool {
        self.lock().session.accepts(job_id)
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.lock().session.is_current(ticket)
    }

    /// Status of `ticket`'s submission, or `None` once it is superseded.
    pub fn status_for(&self, ticket: &SessionTicket) -> Option<JobStatus> {
        let inner = self.lock();
        if !inner.session.is_current(ticket) {
            return None;
        }
        Some(inner.state.status())
    }

    pub fn results_state(&self) -> ResultsState {
        self.lock().state.results_state.clone()
    }

    /// Recompute the workflow view from current state.
    pub fn workflow(&self) -> WorkflowView {
        self.lock().state.workflow()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let inner = self.lock();
        let state = &inner.state;
        TrackerSnapshot {
            job: state.job.clone(),
            status: state.status(),
            active_agent: state.active_agent.clone(),
            completed_agents: state.completed.clone(),
            agent_details: state.agent_details.clone(),
            rag_details: state.rag_details.clone(),
            project_context: state.project_context.clone(),
            results: state.results.clone(),
            results_state: state.results_state.clone(),
            workflow: state.workflow(),
        }
    }

    // ---- guarded mutations ----

    /// Apply a status reported for `job_id`.
    ///
    /// Entering a terminal status clears the active agent and freezes the
    /// completed set used for display. Terminal statuses are never left
    /// and lower-ranked statuses are rejected as stale regressions.
    pub fn set_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        source: StatusSource,
    ) -> StatusUpdate {
        let mut inner = self.lock();
        if !inner.session.accepts(job_id) {
            return StatusUpdate::Stale;
        }
        advance_status(&mut inner.state, job_id, status, source)
    }

    /// Like [`set_status`](Self::set_status), but only while `ticket` is
    /// the current submission.
    pub fn set_status_for(
        &self,
        ticket: &SessionTicket,
        status: JobStatus,
        source: StatusSource,
    ) -> StatusUpdate {
        let mut inner = self.lock();
        if !inner.session.is_current(ticket) {
            return StatusUpdate::Stale;
        }
        advance_status(&mut inner.state, &ticket.job_id, status, source)
    }

    /// Record the agent currently believed to be executing.
    pub fn set_active_agent(&self, job_id: &JobId, agent: AgentId) -> Update {
        self.with_state(job_id, |state| {
            if state.active_agent.as_ref() == Some(&agent) {
                return Update::Unchanged;
            }
            state.active_agent = Some(agent);
            Update::Applied
        })
    }

    /// Add `agent` to the completed set.
    ///
    /// Clears the active agent iff it is the same agent. A provided result
    /// is stored on the agent's record with the current timestamp.
    pub fn complete_agent(
        &self,
        job_id: &JobId,
        agent: AgentId,
        result: Option<serde_json::Value>,
    ) -> Update {
        self.with_state(job_id, |state| {
            if state.active_agent.as_ref() == Some(&agent) {
                state.active_agent = None;
            }
            if let Some(result) = result {
                let record = state
                    .agent_details
                    .entry(agent.clone())
                    .or_insert_with(|| AgentRecord {
                        status: None,
                        detail: None,
                        result: None,
                        updated_at: Utc::now(),
                    });
                record.result = Some(result);
                record.updated_at = Utc::now();
            }
            if state.completed.insert(agent) {
                Update::Applied
            } else {
                Update::Unchanged
            }
        })
    }

    /// Upsert the status detail for `agent`, keeping any stored result.
    pub fn upsert_agent_status(
        &self,
        job_id: &JobId,
        agent: AgentId,
        status: String,
        detail: Option<String>,
    ) -> Update {
        self.with_state(job_id, |state| {
            let now = Utc::now();
            state
                .agent_details
                .entry(agent)
                .and_modify(|record| {
                    record.status = Some(status.clone());
                    record.detail = detail.clone();
                    record.updated_at = now;
                })
                .or_insert_with(|| AgentRecord {
                    status: Some(status.clone()),
                    detail: detail.clone(),
                    result: None,
                    updated_at: now,
                });
            Update::Applied
        })
    }

    pub fn replace_rag_details(&self, job_id: &JobId, details: Vec<serde_json::Value>) -> Update {
        self.with_state(job_id, |state| {
            if state.rag_details == details {
                return Update::Unchanged;
            }
            state.rag_details = details;
            Update::Applied
        })
    }

    pub fn replace_project_context(
        &self,
        job_id: &JobId,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Update {
        self.with_state(job_id, |state| {
            if state.project_context == details {
                return Update::Unchanged;
            }
            state.project_context = details;
            Update::Applied
        })
    }

    // ---- results ----

    /// Claim the one results fetch for `ticket`'s submission.
    ///
    /// Succeeds only while `ticket` is current, once the job is
    /// `completed`, and only if no fetch has been claimed before.
    pub fn claim_results_fetch(&self, ticket: &SessionTicket) -> bool {
        self.claim_results(ticket, |state| matches!(state, ResultsState::NotRequested))
    }

    /// Claim an explicit retry after a failed fetch.
    pub fn claim_results_retry(&self, ticket: &SessionTicket) -> bool {
        self.claim_results(ticket, |state| {
            matches!(state, ResultsState::Unavailable(_))
        })
    }

    /// Give back a claim whose fetch was abandoned before it finished.
    ///
    /// Only an `in_flight` claim of the current submission returns to
    /// `not_requested`.
    pub fn release_results_claim(&self, ticket: &SessionTicket) -> Update {
        self.with_ticket(ticket, |state| {
            if state.results_state != ResultsState::InFlight {
                return Update::Unchanged;
            }
            state.results_state = ResultsState::NotRequested;
            Update::Applied
        })
    }

    pub fn store_results_for(&self, ticket: &SessionTicket, results: AnalysisResults) -> Update {
        self.with_ticket(ticket, |state| {
            state.results = Some(results);
            state.results_state = ResultsState::Ready;
            Update::Applied
        })
    }

    pub fn mark_results_unavailable_for(&self, ticket: &SessionTicket, reason: String) -> Update {
        self.with_ticket(ticket, |state| {
            if state.results.is_some() {
                return Update::Unchanged;
            }
            state.results_state = ResultsState::Unavailable(reason);
            Update::Applied
        })
    }

    // ---- private helpers ----

    fn claim_results(
        &self,
        ticket: &SessionTicket,
        claimable: impl Fn(&ResultsState) -> bool,
    ) -> bool {
        let mut inner = self.lock();
        if !inner.session.is_current(ticket) {
            return false;
        }
        let state = &mut inner.state;
        if state.status() != JobStatus::Completed || !claimable(&state.results_state) {
            return false;
        }
        state.results_state = ResultsState::InFlight;
        true
    }

    /// Run `f` on the state if `ticket` is still the current submission.
    fn with_ticket(
        &self,
        ticket: &SessionTicket,
        f: impl FnOnce(&mut JobState) -> Update,
    ) -> Update {
        let mut inner = self.lock();
        if !inner.session.is_current(ticket) {
            tracing::debug!(job_id = %ticket.job_id, "Discarding result for superseded submission");
            return Update::Stale;
        }
        f(&mut inner.state)
    }

    /// Run `f` on the state if `job_id` passes the staleness filter.
    fn with_state(&self, job_id: &JobId, f: impl FnOnce(&mut JobState) -> Update) -> Update {
        let mut inner = self.lock();
        if !inner.session.accepts(job_id) {
            tracing::debug!(job_id = %job_id, "Discarding signal for inactive job");
            return Update::Stale;
        }
        f(&mut inner.state)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn advance_status(
    state: &mut JobState,
    job_id: &JobId,
    status: JobStatus,
    source: StatusSource,
) -> StatusUpdate {
    let current = state.status();
    if current == status {
        return StatusUpdate::Unchanged;
    }
    if !current.can_advance_to(status) {
        tracing::debug!(
            job_id = %job_id,
            current = %current,
            attempted = %status,
            source = ?source,
            "Rejected status update",
        );
        return StatusUpdate::Rejected {
            current,
            attempted: status,
        };
    }

    if let Some(job) = state.job.as_mut() {
        job.status = status;
    }
    if status.is_terminal() {
        state.active_agent = None;
        state.frozen_completed = Some(state.completed.clone());
    }

    tracing::info!(
        job_id = %job_id,
        from = %current,
        to = %status,
        source = ?source,
        "Job status changed",
    );
    StatusUpdate::Changed {
        from: current,
        to: status,
    }
}
