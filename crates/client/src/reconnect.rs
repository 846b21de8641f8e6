//! Reconnection with capped exponential backoff.
//!
//! After the WebSocket drops, the connection task calls
//! [`reconnect_loop`], which waits, retries and doubles the wait after
//! every failure until a handshake succeeds or the [`CancellationToken`]
//! fires. Events sent while disconnected are lost; the tracker's poll
//! loop covers the gap.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{EventStreamClient, EventStreamConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Ceiling for the wait between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub factor: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2,
        }
    }
}

/// Sequence of waits produced by a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    factor: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            max: config.max_delay,
            factor: config.factor.max(1),
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(self.factor).min(self.max);
        Some(current)
    }
}

/// Retry the handshake until it succeeds.
///
/// Returns `None` if `cancel` fires first.
pub async fn reconnect_loop(
    client: &EventStreamClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<EventStreamConnection> {
    for (attempt, delay) in (1u32..).zip(Backoff::new(config)) {
        // The caller has just seen the connection fail, so wait first.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        tracing::info!(
            url = %client.ws_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting push channel",
        );

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(attempt, "Push channel reconnect cancelled");
                return None;
            }
            result = client.connect() => result,
        };

        match result {
            Ok(conn) => {
                tracing::info!(attempt, client_id = %conn.client_id, "Push channel reconnected");
                return Some(conn);
            }
            Err(e) => tracing::warn!(attempt, error = %e, "Push channel reconnect failed"),
        }
    }
    None
}
