//! Identity of the active job.
//!
//! Every inbound signal is checked against the session before it may
//! touch shared state. A submission replaces the identity wholesale, so
//! signals still in flight for the previous job are discarded.

use auditwatch_core::{Job, JobId};

/// Versioned identity captured at submission time.
///
/// The epoch distinguishes two submissions even if the backend were to
/// hand out the same job id twice. Long-lived tasks (poll loops, results
/// fetches) hold a ticket and stop writing once it is no longer current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub job_id: JobId,
    pub epoch: u64,
}

#[derive(Debug, Default)]
pub struct JobSession {
    epoch: u64,
    active: Option<ActiveJob>,
}

#[derive(Debug)]
struct ActiveJob {
    ticket: SessionTicket,
    display_name: String,
}

impl JobSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `job` the active job and return its ticket.
    pub fn submit(&mut self, job: &Job) -> SessionTicket {
        self.epoch += 1;
        let ticket = SessionTicket {
            job_id: job.id.clone(),
            epoch: self.epoch,
        };
        self.active = Some(ActiveJob {
            ticket: ticket.clone(),
            display_name: job.display_name.clone(),
        });
        ticket
    }

    /// Forget the active job. Every subsequent signal is stale.
    pub fn end(&mut self) {
        self.active = None;
    }

    pub fn current_id(&self) -> Option<&JobId> {
        self.active.as_ref().map(|a| &a.ticket.job_id)
    }

    pub fn current_ticket(&self) -> Option<&SessionTicket> {
        self.active.as_ref().map(|a| &a.ticket)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.display_name.as_str())
    }

    /// The staleness filter: does a signal tagged `job_id` belong to the
    /// active job?
    pub fn accepts(&self, job_id: &JobId) -> bool {
        self.current_id() == Some(job_id)
    }

    /// Whether `ticket` was issued by the latest submission.
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.current_ticket() == Some(ticket)
    }
}
