//! WebSocket-backed push channel.
//!
//! [`WsEventChannel`] keeps one connection to the push endpoint for the
//! life of the process. [`EventChannel::connect`] performs the first
//! handshake and spawns a connection task (process frames -> reconnect
//! loop) that dispatches every parsed event through the shared
//! [`HandlerRegistry`]. [`EventChannel::disconnect`] cancels the task and
//! waits for it to exit.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelError, EventChannel, EventHandler, HandlerRegistry, SubscriptionId};
use crate::client::{EventStream, EventStreamClient};
use crate::messages::{parse_message, EventKind};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Default upper bound on waiting for the connection task at disconnect.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WsEventChannel {
    client: Arc<EventStreamClient>,
    registry: Arc<HandlerRegistry>,
    reconnect: ReconnectConfig,
    shutdown_timeout: Duration,
    task: Mutex<Option<ConnectionTask>>,
}

/// Bookkeeping for the running connection task.
struct ConnectionTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WsEventChannel {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(EventStreamClient::new(ws_url)),
            registry: Arc::new(HandlerRegistry::new()),
            reconnect: ReconnectConfig::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            task: Mutex::new(None),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Whether a connection task is currently running.
    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ConnectionTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventChannel for WsEventChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        if self.is_running() {
            return Ok(());
        }

        let conn = self
            .client
            .connect()
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let cancel = CancellationToken::new();
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let reconnect = self.reconnect.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(client_id = %conn.client_id, "Push channel task started");
            run_connection_loop(&client, conn.ws_stream, &registry, &reconnect, &task_cancel).await;
            tracing::info!("Push channel task exited");
        });

        let previous = self.slot().replace(ConnectionTask { handle, cancel });
        if let Some(previous) = previous {
            // A finished task left behind by a dropped connection.
            previous.cancel.cancel();
        }
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.registry.subscribe(kind, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    async fn disconnect(&self) {
        let task = self.slot().take();
        let Some(task) = task else {
            return;
        };

        tracing::info!("Disconnecting push channel");
        task.cancel.cancel();
        if tokio::time::timeout(self.shutdown_timeout, task.handle)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Push channel task did not exit in time",
            );
        }
    }
}

impl Drop for WsEventChannel {
    fn drop(&mut self) {
        if let Some(task) = self.slot().take() {
            task.cancel.cancel();
        }
    }
}

/// Process frames until the connection drops, then reconnect.
///
/// Runs until the cancellation token is triggered.
async fn run_connection_loop(
    client: &EventStreamClient,
    first: EventStream,
    registry: &HandlerRegistry,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) {
    let mut ws_stream = first;

    loop {
        process_frames(&mut ws_stream, registry, cancel).await;

        if cancel.is_cancelled() {
            let _ = ws_stream.close(None).await;
            return;
        }

        tracing::warn!("Push channel connection lost, entering reconnect loop");
        match reconnect_loop(client, reconnect, cancel).await {
            Some(conn) => ws_stream = conn.ws_stream,
            None => return,
        }
    }
}

/// Read frames from one connection and dispatch parsed events.
///
/// Returns when the socket closes, fails, or `cancel` fires.
async fn process_frames(
    ws_stream: &mut EventStream,
    registry: &HandlerRegistry,
    cancel: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = ws_stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_text_frame(&text, registry),
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Push endpoint closed WebSocket");
                return;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "WebSocket receive error");
                return;
            }
            None => {
                tracing::info!("WebSocket stream exhausted");
                return;
            }
        }
    }
}

fn handle_text_frame(text: &str, registry: &HandlerRegistry) {
    match parse_message(text) {
        Ok(event) => {
            tracing::debug!(event = %event.kind(), job_id = %event.job_id(), "Push event received");
            registry.dispatch(&event);
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse push event");
        }
    }
}
