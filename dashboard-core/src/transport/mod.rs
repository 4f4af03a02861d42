//! Transport Layer
//!
//! Owns the single live connection to the telemetry backend:
//! - [`Transport`]: connection lifecycle, handler slots, ordered dispatch
//! - [`queue`]: SPSC event queue between the link task and the owner
//! - [`Connector`] / [`WebSocketConnector`]: socket abstraction
//!
//! Reconnection is explicit. After `Closed` or `Errored` the owner calls
//! [`Transport::connect`] again; nothing retries on its own.

pub mod connection;
pub mod connector;
pub mod queue;
pub mod state;
pub mod websocket;

pub use connection::{MessageHandler, RawMessage, StateHandler, Transport, TransportStats};
pub use connector::{Connector, Handshake, Inbound, InboundStream};
pub use queue::{link_queue, LinkEvent, QueueStats, DEFAULT_CAPACITY};
pub use state::{ConnectionState, TransportError};
pub use websocket::WebSocketConnector;
