//! Submit, start and follow one analysis job.

use std::sync::Arc;

use anyhow::{bail, Context};
use auditwatch_client::{HttpJobApi, WsEventChannel};
use auditwatch_core::{Job, JobStatus};
use auditwatch_tracker::{ResultsState, Tracker, TrackerConfig, TrackerEvent};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::args::{Cli, Command};
use crate::render::{render_event, render_summary};

/// Run the command described by `cli` to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = TrackerConfig::from_env().context("Invalid tracker configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(events_url) = cli.events_url {
        config.events_url = events_url;
    }

    tracing::info!(
        api_url = %config.api_url,
        events_url = %config.events_url,
        "Starting auditwatch",
    );

    let api = Arc::new(HttpJobApi::new(config.api_url.clone()));
    let channel = Arc::new(WsEventChannel::new(config.events_url.clone()));
    let tracker = Tracker::start(channel, api.clone(), config)
        .await
        .context("Failed to connect to the push channel")?;
    let mut events = tracker.subscribe();

    let result = follow_job(&tracker, &api, &cli.command, &mut events).await;
    tracker.shutdown().await;
    result
}

async fn follow_job(
    tracker: &Tracker,
    api: &HttpJobApi,
    command: &Command,
    events: &mut broadcast::Receiver<TrackerEvent>,
) -> anyhow::Result<()> {
    let options = command.analysis().to_options();
    options.validate().context("Invalid analysis options")?;

    let job = submit(api, command).await?;
    tracker.submit(job).await;

    let ready = wait_until(tracker, events, |status| {
        status.is_ready_for_analysis() || status.is_terminal()
    })
    .await?;
    if ready == JobStatus::Error {
        println!("{}", render_summary(&tracker.snapshot()));
        bail!("Contract could not be retrieved");
    }

    tracker
        .start_analysis(&options)
        .await
        .context("Failed to start analysis")?;

    wait_until_settled(tracker, events).await?;
    let snapshot = tracker.snapshot();
    println!("{}", render_summary(&snapshot));

    if snapshot.status == JobStatus::Error {
        bail!("Analysis failed");
    }
    Ok(())
}

async fn submit(api: &HttpJobApi, command: &Command) -> anyhow::Result<Job> {
    match command {
        Command::Upload { file, .. } => {
            let contents = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            Ok(api.upload_contract(&file_name, contents).await?)
        }
        Command::Fetch {
            network, address, ..
        } => Ok(api.fetch_contract(network, address).await?),
    }
}

/// Print notifications until the job's status satisfies `done`.
async fn wait_until(
    tracker: &Tracker,
    events: &mut broadcast::Receiver<TrackerEvent>,
    done: impl Fn(JobStatus) -> bool,
) -> anyhow::Result<JobStatus> {
    loop {
        let status = tracker.status();
        if done(status) {
            return Ok(status);
        }
        next_event(tracker, events).await?;
    }
}

/// Print notifications until the job is terminal and, for a completed
/// job, the results fetch has finished one way or the other.
async fn wait_until_settled(
    tracker: &Tracker,
    events: &mut broadcast::Receiver<TrackerEvent>,
) -> anyhow::Result<()> {
    loop {
        let snapshot = tracker.snapshot();
        let settled = match snapshot.status {
            JobStatus::Error => true,
            JobStatus::Completed => matches!(
                snapshot.results_state,
                ResultsState::Ready | ResultsState::Unavailable(_)
            ),
            _ => false,
        };
        if settled {
            return Ok(());
        }
        next_event(tracker, events).await?;
    }
}

async fn next_event(
    tracker: &Tracker,
    events: &mut broadcast::Receiver<TrackerEvent>,
) -> anyhow::Result<()> {
    let received = tokio::select! {
        received = events.recv() => received,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    };

    match received {
        Ok(event) => {
            if let Some(line) = render_event(&event, &tracker.snapshot()) {
                println!("{line}");
            }
            Ok(())
        }
        Err(RecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Progress output fell behind");
            Ok(())
        }
        Err(RecvError::Closed) => bail!("Tracker notifications closed"),
    }
}
