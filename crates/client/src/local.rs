//! In-process push channel.
//!
//! [`LocalEventChannel`] delivers events handed to it directly by the
//! owner instead of reading them from a socket. It is used to embed the
//! tracker next to an in-process producer and as the channel in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::channel::{ChannelError, EventChannel, EventHandler, HandlerRegistry, SubscriptionId};
use crate::messages::{parse_message, EventKind, PushEvent};

#[derive(Default)]
pub struct LocalEventChannel {
    registry: HandlerRegistry,
    connected: AtomicBool,
}

impl LocalEventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Deliver one event to the registered handlers.
    ///
    /// While disconnected the event is dropped, like a frame missed by a
    /// real transport. Returns the number of handlers invoked.
    pub fn deliver(&self, event: &PushEvent) -> usize {
        if !self.is_connected() {
            tracing::debug!(
                event = %event.kind(),
                job_id = %event.job_id(),
                "Channel disconnected, dropping event",
            );
            return 0;
        }
        self.registry.dispatch(event)
    }

    /// Parse and deliver a raw text frame.
    pub fn deliver_frame(&self, text: &str) -> Result<usize, serde_json::Error> {
        let event = parse_message(text)?;
        Ok(self.deliver(&event))
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry.handler_count(kind)
    }

    pub fn total_handlers(&self) -> usize {
        self.registry.total_handlers()
    }
}

#[async_trait]
impl EventChannel for LocalEventChannel {
    async fn connect(&self) -> Result<(), ChannelError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.registry.subscribe(kind, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn events_are_dropped_until_connected() {
        let channel = LocalEventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        channel.subscribe(
            EventKind::AnalysisStarted,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let frame = r#"{"event":"analysis_started","data":{"job_id":"j"}}"#;
        assert_eq!(channel.deliver_frame(frame).unwrap(), 0);

        channel.connect().await.unwrap();
        assert_eq!(channel.deliver_frame(frame).unwrap(), 1);

        channel.disconnect().await;
        assert_eq!(channel.deliver_frame(frame).unwrap(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let channel = LocalEventChannel::new();
        assert!(channel.deliver_frame("{}").is_err());
    }
}
