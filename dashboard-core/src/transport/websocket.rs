//! WebSocket connector (tokio-tungstenite)

use super::connector::{Connector, Inbound, InboundStream};
use super::state::TransportError;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Opens real WebSocket links
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        endpoint: &str,
        handshake: Option<String>,
    ) -> BoxFuture<'static, Result<InboundStream, TransportError>> {
        let endpoint = endpoint.to_string();
        async move {
            let (mut socket, response) = connect_async(endpoint.as_str())
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            info!(endpoint = %endpoint, status = %response.status(), "WebSocket connected");

            if let Some(payload) = handshake {
                debug!(payload = %payload, "Sending handshake");
                socket
                    .send(Message::Text(payload))
                    .await
                    .map_err(|e| TransportError::Protocol(e.to_string()))?;
            }

            let stream = socket.filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text))),
                    Ok(Message::Binary(bytes)) => Some(Ok(Inbound::Binary(bytes))),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Close frame received");
                        None
                    }
                    // ping/pong are answered by tungstenite
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::Protocol(e.to_string()))),
                }
            });

            Ok(stream.boxed())
        }
        .boxed()
    }
}
