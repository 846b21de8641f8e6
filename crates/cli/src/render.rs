//! Terminal rendering of tracker notifications and results.

use auditwatch_core::workflow::step_index;
use auditwatch_core::{JobStatus, WORKFLOW_STEPS};
use auditwatch_tracker::{PollStopReason, ResultsState, TrackerEvent, TrackerSnapshot};

/// One progress line for `event`, or `None` for events not worth a line.
pub fn render_event(event: &TrackerEvent, snapshot: &TrackerSnapshot) -> Option<String> {
    let line = match event {
        TrackerEvent::JobSubmitted {
            job_id,
            display_name,
            status,
        } => format!("Submitted {display_name} as job {job_id} ({status})"),
        TrackerEvent::StatusChanged { from, to, .. } => format!("Status: {from} -> {to}"),
        TrackerEvent::AgentActivated { agent, .. } => {
            let label = step_label(agent).unwrap_or(agent.as_str());
            format!(
                "[{:>3}%] {label} running",
                snapshot.workflow.progress_percent
            )
        }
        TrackerEvent::AgentCompleted { agent, .. } => {
            let label = step_label(agent).unwrap_or(agent.as_str());
            format!("       {label} done")
        }
        TrackerEvent::AgentStatus {
            agent, status, detail, ..
        } => match detail {
            Some(detail) => format!("       {agent}: {status} ({detail})"),
            None => format!("       {agent}: {status}"),
        },
        TrackerEvent::ResultsUnavailable { reason, .. } => format!("Results unavailable: {reason}"),
        TrackerEvent::PollStopped {
            reason: PollStopReason::Failed,
            ..
        } => "Backend reported the job as failed".to_string(),
        TrackerEvent::ContextUpdated { .. }
        | TrackerEvent::ResultsReady { .. }
        | TrackerEvent::PollStopped { .. } => return None,
    };
    Some(line)
}

/// Final report for a job that reached a terminal status.
pub fn render_summary(snapshot: &TrackerSnapshot) -> String {
    let name = snapshot
        .job
        .as_ref()
        .map_or("job", |job| job.display_name.as_str());

    match (snapshot.status, &snapshot.results_state, &snapshot.results) {
        (JobStatus::Error, _, _) => {
            let reached = snapshot.workflow.completed_count();
            format!(
                "Analysis of {name} failed after {reached} of {} steps",
                WORKFLOW_STEPS.len()
            )
        }
        (JobStatus::Completed, ResultsState::Ready, Some(results)) => {
            if results.no_vulnerability_found() {
                return format!("Analysis of {name} completed: no vulnerabilities found");
            }
            format!(
                "Analysis of {name} completed: {} verified vulnerabilities, {} proofs of concept",
                results.rechecked_vulnerabilities().len(),
                results.generated_pocs().len(),
            )
        }
        (JobStatus::Completed, ResultsState::Unavailable(reason), _) => {
            format!(
                "Analysis of {name} completed but results could not be fetched: {reason}"
            )
        }
        (status, _, _) => format!("Analysis of {name} is {status}"),
    }
}

fn step_label(agent: &auditwatch_core::AgentId) -> Option<&'static str> {
    step_index(agent).map(|index| WORKFLOW_STEPS[index].label)
}

#[cfg(test)]
mod tests {
    use auditwatch_core::{AgentId, AnalysisResults, Job, JobId};
    use auditwatch_tracker::{StateStore, StatusSource};

    use super::*;

    fn snapshot_for(status: JobStatus) -> (StateStore, JobId) {
        let store = StateStore::new();
        store.reset(Job::new("j", "Token.sol", JobStatus::Uploaded));
        let id = JobId::from("j");
        store.set_status(&id, JobStatus::Analyzing, StatusSource::Push);
        store.set_status(&id, status, StatusSource::Push);
        (store, id)
    }

    #[test]
    fn agent_activation_shows_label_and_progress() {
        let (store, id) = snapshot_for(JobStatus::Analyzing);
        store.set_active_agent(&id, AgentId::Skeptic);
        let event = TrackerEvent::AgentActivated {
            job_id: id,
            agent: AgentId::Skeptic,
        };

        let line = render_event(&event, &store.snapshot()).unwrap();
        assert!(line.contains("50%"), "{line}");
        assert!(line.contains(WORKFLOW_STEPS[3].label), "{line}");
    }

    #[test]
    fn auxiliary_agent_status_uses_raw_name() {
        let (store, id) = snapshot_for(JobStatus::Analyzing);
        let event = TrackerEvent::AgentStatus {
            job_id: id,
            agent: AgentId::ProjectContext,
            status: "Processing".into(),
            detail: Some("Found 3 contracts".into()),
        };
        let line = render_event(&event, &store.snapshot()).unwrap();
        assert_eq!(
            line.trim(),
            "project_context_llm: Processing (Found 3 contracts)"
        );
    }

    #[test]
    fn quiet_events_render_nothing() {
        let (store, id) = snapshot_for(JobStatus::Analyzing);
        let event = TrackerEvent::ContextUpdated { job_id: id };
        assert!(render_event(&event, &store.snapshot()).is_none());
    }

    #[test]
    fn completed_summary_counts_findings() {
        let (store, _) = snapshot_for(JobStatus::Completed);
        let ticket = store.current_ticket().unwrap();
        store.claim_results_fetch(&ticket);
        let results = AnalysisResults::new(serde_json::json!({
            "rechecked_vulnerabilities": [{}, {}],
            "generated_pocs": [{}],
        }));
        store.store_results_for(&ticket, results);
        assert_eq!(
            render_summary(&store.snapshot()),
            "Analysis of Token.sol completed: 2 verified vulnerabilities, 1 proofs of concept"
        );
    }

    #[test]
    fn unavailable_results_are_reported_as_partial_success() {
        let (store, _) = snapshot_for(JobStatus::Completed);
        let ticket = store.current_ticket().unwrap();
        store.claim_results_fetch(&ticket);
        store.mark_results_unavailable_for(&ticket, "timed out".into());
        let summary = render_summary(&store.snapshot());
        assert!(
            summary.contains("could not be fetched: timed out"),
            "{summary}"
        );
    }

    #[test]
    fn failed_summary_reports_progress_at_failure() {
        let (store, id) = snapshot_for(JobStatus::Analyzing);
        store.complete_agent(&id, AgentId::StaticAnalyzer, None);
        store.set_status(&id, JobStatus::Error, StatusSource::Poll);
        assert_eq!(
            render_summary(&store.snapshot()),
            "Analysis of Token.sol failed after 1 of 8 steps"
        );
    }
}
