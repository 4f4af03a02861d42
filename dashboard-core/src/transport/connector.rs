//! Socket abstraction
//!
//! A [`Connector`] opens one link and yields its inbound frames as a stream.
//! Production uses [`super::WebSocketConnector`]; tests plug in channels.

use super::state::TransportError;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// One raw inbound frame, before JSON decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

impl Inbound {
    pub fn len(&self) -> usize {
        match self {
            Inbound::Text(text) => text.len(),
            Inbound::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the payload as JSON
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Inbound::Text(text) => serde_json::from_str(text),
            Inbound::Binary(bytes) => serde_json::from_slice(bytes),
        }
    }
}

/// Stream of inbound frames; ends when the peer closes
pub type InboundStream = BoxStream<'static, Result<Inbound, TransportError>>;

/// Opens links for a [`super::Transport`]
pub trait Connector: Send + Sync + 'static {
    /// Open a link to `endpoint`, sending `handshake` (serialized JSON) first
    /// when given
    fn open(
        &self,
        endpoint: &str,
        handshake: Option<String>,
    ) -> BoxFuture<'static, Result<InboundStream, TransportError>>;
}

/// Initial message telling the backend which use case to stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(rename = "useCase")]
    pub use_case: String,
}

impl Handshake {
    pub fn new(use_case: impl Into<String>) -> Self {
        Self {
            use_case: use_case.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
