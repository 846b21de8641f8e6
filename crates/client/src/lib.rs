//! Push-channel and REST client library for the analysis backend.
//!
//! Provides typed push-event parsing, the [`EventChannel`] subscription
//! seam with an in-process and a WebSocket implementation, reconnection
//! logic, and HTTP wrappers for the submission, status and results
//! endpoints.

pub mod api;
pub mod channel;
pub mod client;
pub mod local;
pub mod messages;
pub mod reconnect;
pub mod ws_channel;

pub use api::{ApiError, HttpJobApi, JobApi};
pub use channel::{ChannelError, EventChannel, EventHandler, HandlerRegistry, SubscriptionId};
pub use local::LocalEventChannel;
pub use messages::{parse_message, EventKind, PushEvent};
pub use ws_channel::WsEventChannel;
