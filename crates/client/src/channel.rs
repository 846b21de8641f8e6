//! Subscription seam over the push-notification transport.
//!
//! [`EventChannel`] is the interface the tracker depends on; it never
//! touches a concrete transport. [`HandlerRegistry`] is the shared
//! per-event-kind handler table both implementations dispatch through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::messages::{EventKind, PushEvent};

/// Callback invoked for every delivered event of the subscribed kind.
///
/// Handlers run to completion on the transport's dispatch task and must
/// not block.
pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Errors from connecting a push channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The transport could not be reached.
    #[error("Failed to connect push channel: {0}")]
    Connect(String),
}

/// A connection to the push-notification transport.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Open the transport. Calling this on a connected channel is a no-op.
    async fn connect(&self) -> Result<(), ChannelError>;

    /// Register `handler` for events of `kind`.
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId;

    /// Remove a handler. Returns `false` if it was already removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Close the transport. Registered handlers stay registered.
    async fn disconnect(&self);
}

type HandlerTable = HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>;

/// Per-kind handler table.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HandlerTable>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.table().entry(kind).or_default().push((id, handler));
        tracing::debug!(event = %kind, subscription = id.0, "Handler subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table();
        for handlers in table.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sub, _)| *sub == id) {
                handlers.remove(pos);
                tracing::debug!(subscription = id.0, "Handler unsubscribed");
                return true;
            }
        }
        false
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// The table lock is released before handlers run, so a handler may
    /// subscribe or unsubscribe. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        let handlers: Vec<EventHandler> = self
            .table()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!(event = %event.kind(), "No handlers for event");
        }
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.table().get(&kind).map_or(0, Vec::len)
    }

    pub fn total_handlers(&self) -> usize {
        self.table().values().map(Vec::len).sum()
    }

    fn table(&self) -> MutexGuard<'_, HandlerTable> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
