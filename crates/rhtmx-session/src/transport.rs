// File: src/transport.rs
// Purpose: Message channel abstraction between a session and its client

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::{mpsc, Mutex};
use url::Url;

use crate::error::TransportError;

/// A bidirectional JSON message channel to one client
///
/// Framing and the concrete socket live behind this trait; sessions only
/// ever see whole JSON documents.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, message: Value) -> Result<(), TransportError>;

    /// Waits for the next message. Must be cancel-safe.
    async fn receive_message(&self) -> Result<Value, TransportError>;
}

/// Metadata about the connection a session was opened on
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub client_ip: IpAddr,
    pub client_port: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    /// URL the client asked for
    pub url: Url,
}

impl ConnectionInfo {
    pub fn new(url: Url) -> Self {
        Self {
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            client_port: 0,
            headers: HashMap::new(),
            url,
        }
    }

    pub fn with_client(mut self, ip: IpAddr, port: u16) -> Self {
        self.client_ip = ip;
        self.client_port = port;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

// ============================================================================
// In-memory transport
// ============================================================================

/// Server side of an in-process channel pair
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<Value>,
    incoming: Mutex<mpsc::UnboundedReceiver<Value>>,
}

/// Client side of an in-process channel pair
pub struct ClientEnd {
    outgoing: mpsc::UnboundedSender<Value>,
    incoming: mpsc::UnboundedReceiver<Value>,
}

impl ChannelTransport {
    /// Creates a connected server/client pair
    pub fn pair() -> (Self, ClientEnd) {
        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();

        let server = Self {
            outgoing: to_client,
            incoming: Mutex::new(from_client),
        };
        let client = ClientEnd {
            outgoing: to_server,
            incoming: from_server,
        };

        (server, client)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_message(&self, message: Value) -> Result<(), TransportError> {
        self.outgoing.send(message).map_err(|_| TransportError::Closed)
    }

    async fn receive_message(&self) -> Result<Value, TransportError> {
        self.incoming.lock().await.recv().await.ok_or(TransportError::Closed)
    }
}

impl ClientEnd {
    pub fn send(&self, message: Value) -> Result<(), TransportError> {
        self.outgoing.send(message).map_err(|_| TransportError::Closed)
    }

    /// Next message from the server, `None` once the server side is gone
    pub async fn recv(&mut self) -> Option<Value> {
        self.incoming.recv().await
    }

    /// Everything the server has sent so far
    pub fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(message) = self.incoming.try_recv() {
            messages.push(message);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_round_trip() {
        let (server, mut client) = ChannelTransport::pair();

        server.send_message(json!({ "method": "pong" })).await.unwrap();
        assert_eq!(client.recv().await, Some(json!({ "method": "pong" })));

        client.send(json!({ "method": "ping" })).unwrap();
        assert_eq!(server.receive_message().await.unwrap(), json!({ "method": "ping" }));
    }

    #[tokio::test]
    async fn test_dropped_client_closes_channel() {
        let (server, client) = ChannelTransport::pair();
        drop(client);

        assert_eq!(server.receive_message().await, Err(TransportError::Closed));
        assert_eq!(server.send_message(json!(null)).await, Err(TransportError::Closed));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let info = ConnectionInfo::new(Url::parse("http://localhost/").unwrap())
            .with_header("User-Agent", "test");
        assert_eq!(info.header("user-agent"), Some("test"));
    }
}
