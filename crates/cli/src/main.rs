//! `auditwatch` -- follow a smart-contract analysis from the terminal.
//!
//! # Environment variables
//!
//! | Variable                | Default                      | Description                    |
//! |-------------------------|------------------------------|--------------------------------|
//! | `AUDITWATCH_API_URL`    | `http://localhost:3000/api`  | REST endpoints                 |
//! | `AUDITWATCH_EVENTS_URL` | `ws://localhost:3000/events` | Push channel                   |
//! | `POLL_INTERVAL_SECS`    | `5`                          | Status poll period             |
//! | `REQUEST_TIMEOUT_SECS`  | `30`                         | Bound on one status/results call |
//! | `SHUTDOWN_TIMEOUT_SECS` | `5`                          | Bound on teardown waits        |

use auditwatch_cli::{run, Cli};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "auditwatch_cli=info,auditwatch_tracker=info,auditwatch_client=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer().with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "auditwatch failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
