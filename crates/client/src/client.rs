//! WebSocket client for the backend's push-notification endpoint.
//!
//! [`EventStreamClient`] holds the endpoint configuration. Call
//! [`EventStreamClient::connect`] to establish a live
//! [`EventStreamConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Raw WebSocket stream type used by the push channel.
pub type EventStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the push endpoint.
pub struct EventStreamClient {
    ws_url: String,
}

/// A live WebSocket connection to the push endpoint.
pub struct EventStreamConnection {
    /// Unique client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: EventStream,
}

impl EventStreamClient {
    /// * `ws_url` - WebSocket endpoint, e.g. `ws://host:3000/events`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the push endpoint.
    ///
    /// A fresh `clientId` (UUID v4) is appended as a query parameter on
    /// every attempt so the server can tell reconnects apart.
    pub async fn connect(&self) -> Result<EventStreamConnection, ClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let separator = if self.ws_url.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}clientId={client_id}", self.ws_url);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ClientError::Connection(format!(
                "Failed to connect to push endpoint at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to push endpoint at {}", self.ws_url);

        Ok(EventStreamConnection {
            client_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
