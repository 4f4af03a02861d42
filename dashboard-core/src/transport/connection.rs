//! Single-owner connection manager
//!
//! [`Transport`] owns at most one live link. The link runs as a tokio task
//! that only produces [`LinkEvent`]s into the SPSC queue; decoding and handler
//! dispatch happen on the owner's task in [`Transport::dispatch_pending`] or
//! [`Transport::pump`], strictly one event at a time in arrival order.

use super::connector::{Connector, Handshake};
use super::queue::{link_queue, LinkEvent, LinkReceiver, LinkSender, QueueStats, QueuedEvent};
use super::state::{ConnectionState, TransportError};
use super::websocket::WebSocketConnector;
use crate::time::{Clock, SystemClock, Timestamp};
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Decoded inbound payload handed to the message handler
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Which link produced the message (increments on every connect)
    pub link_id: u64,
    /// Arrival order number on that link
    pub sequence: u64,
    /// When the link task took the frame off the socket
    pub received_at: Timestamp,
    pub payload: serde_json::Value,
}

/// Consumer of inbound payloads
pub type MessageHandler = Box<dyn FnMut(RawMessage)>;

/// Observer of connection-state transitions
pub type StateHandler = Box<dyn FnMut(ConnectionState)>;

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Payloads handed to the message handler
    pub delivered: u64,
    /// Payloads that were not valid JSON
    pub undecodable: u64,
    /// Payloads that arrived with no message handler attached
    pub unclaimed: u64,
    /// Queued events thrown away by `close()`
    pub discarded: u64,
}

/// Handler slot state machine: `Vacant` <-> `Attached`
enum HandlerSlot<F> {
    Vacant,
    Attached(F),
}

impl<F> HandlerSlot<F> {
    fn attach(&mut self, handler: F, kind: &'static str) -> crate::Result<()> {
        match self {
            HandlerSlot::Attached(_) => Err(crate::Error::HandlerAttached(kind)),
            HandlerSlot::Vacant => {
                *self = HandlerSlot::Attached(handler);
                Ok(())
            }
        }
    }

    fn detach(&mut self) -> Option<F> {
        match std::mem::replace(self, HandlerSlot::Vacant) {
            HandlerSlot::Attached(handler) => Some(handler),
            HandlerSlot::Vacant => None,
        }
    }

    fn is_attached(&self) -> bool {
        matches!(self, HandlerSlot::Attached(_))
    }
}

/// The one link currently owned by the transport
struct ActiveLink {
    id: u64,
    endpoint: String,
    receiver: LinkReceiver,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Drop for ActiveLink {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

/// Owner of the live connection
///
/// Dropping the transport releases the link the same way [`Transport::close`]
/// does.
pub struct Transport {
    connector: Arc<dyn Connector>,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    state: ConnectionState,
    link: Option<ActiveLink>,
    next_link_id: u64,
    queue_capacity: usize,
    last_error: Option<TransportError>,
    stats: TransportStats,
    message_handler: HandlerSlot<MessageHandler>,
    state_handler: HandlerSlot<StateHandler>,
}

impl Transport {
    /// Create a transport on the current tokio runtime
    pub fn new(connector: Arc<dyn Connector>) -> crate::Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| crate::Error::Runtime(format!("no tokio runtime: {}", e)))?;
        Ok(Self::with_runtime(connector, runtime))
    }

    /// WebSocket transport on the current tokio runtime
    pub fn websocket() -> crate::Result<Self> {
        Self::new(Arc::new(WebSocketConnector::new()))
    }

    /// Create a transport that spawns link tasks on `runtime`
    pub fn with_runtime(connector: Arc<dyn Connector>, runtime: Handle) -> Self {
        Self {
            connector,
            runtime,
            clock: Arc::new(SystemClock),
            state: ConnectionState::Closed,
            link: None,
            next_link_id: 0,
            queue_capacity: super::queue::DEFAULT_CAPACITY,
            last_error: None,
            stats: TransportStats::default(),
            message_handler: HandlerSlot::Vacant,
            state_handler: HandlerSlot::Vacant,
        }
    }

    /// Set the inbound queue capacity used by subsequent connects
    pub fn with_queue_capacity(mut self, capacity: usize) -> crate::Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(crate::Error::Config(format!(
                "queue capacity must be a power of 2, got {}",
                capacity
            )));
        }
        self.queue_capacity = capacity;
        Ok(self)
    }

    /// Replace the clock used to stamp inbound frames on arrival
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach the single consumer of inbound payloads
    pub fn on_message<F>(&mut self, handler: F) -> crate::Result<()>
    where
        F: FnMut(RawMessage) + 'static,
    {
        self.message_handler.attach(Box::new(handler), "message")
    }

    /// Attach the single observer of state transitions
    pub fn on_state_change<F>(&mut self, handler: F) -> crate::Result<()>
    where
        F: FnMut(ConnectionState) + 'static,
    {
        self.state_handler.attach(Box::new(handler), "state")
    }

    pub fn detach_message_handler(&mut self) -> Option<MessageHandler> {
        self.message_handler.detach()
    }

    pub fn detach_state_handler(&mut self) -> Option<StateHandler> {
        self.state_handler.detach()
    }

    pub fn has_message_handler(&self) -> bool {
        self.message_handler.is_attached()
    }

    /// Open a connection to `endpoint`
    ///
    /// Returns `false` without doing anything if a connection attempt or open
    /// connection already exists.
    pub fn connect(&mut self, endpoint: &str, handshake: Option<&Handshake>) -> bool {
        if let Some(link) = &self.link {
            debug!(
                link_id = link.id,
                endpoint = %link.endpoint,
                "Connect ignored, link already active"
            );
            return false;
        }

        let handshake = handshake.and_then(|h| match h.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize handshake, connecting without it");
                None
            }
        });

        let link_id = self.next_link_id;
        self.next_link_id += 1;

        let (sender, receiver) = link_queue(self.queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = self.runtime.spawn(run_link(
            Arc::clone(&self.connector),
            Arc::clone(&self.clock),
            endpoint.to_string(),
            handshake,
            sender,
            shutdown_rx,
        ));

        info!(link_id, endpoint, "Connecting");
        self.link = Some(ActiveLink {
            id: link_id,
            endpoint: endpoint.to_string(),
            receiver,
            shutdown: Some(shutdown_tx),
            task,
        });
        self.transition(ConnectionState::Connecting);
        true
    }

    /// Release the link and transition to `Closed`
    ///
    /// Events still queued for the link are discarded.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            let discarded = link.receiver.available() as u64;
            self.stats.discarded += discarded;
            info!(link_id = link.id, discarded, "Closing connection");
        }
        self.transition(ConnectionState::Closed);
    }

    /// Dispatch every queued event without waiting
    ///
    /// Returns the number of events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(queued) = self.link.as_mut().and_then(|link| link.receiver.try_recv()) {
            self.handle(queued);
            handled += 1;
        }
        handled
    }

    /// Wait for the next event and dispatch it
    ///
    /// Returns `false` immediately when there is no link.
    pub async fn pump(&mut self) -> bool {
        let next = match self.link.as_mut() {
            Some(link) => link.receiver.recv().await,
            None => return false,
        };
        match next {
            Some(queued) => self.handle(queued),
            None => self.fail_link(TransportError::Runtime(
                "link task ended without reporting".to_string(),
            )),
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A connection attempt or open link exists
    pub fn is_active(&self) -> bool {
        self.link.is_some()
    }

    /// Error that caused the last `Errored` transition
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Id of the active link, if any
    pub fn link_id(&self) -> Option<u64> {
        self.link.as_ref().map(|link| link.id)
    }

    /// Queue statistics of the active link
    pub fn queue_stats(&self) -> Option<Arc<QueueStats>> {
        self.link.as_ref().map(|link| link.receiver.stats())
    }

    fn handle(&mut self, queued: QueuedEvent) {
        let link_id = match &self.link {
            Some(link) => link.id,
            None => return,
        };

        match queued.event {
            LinkEvent::Opened => {
                info!(link_id, "Connection open");
                self.transition(ConnectionState::Open);
            }
            LinkEvent::Message {
                inbound,
                received_at,
            } => match inbound.to_json() {
                Ok(payload) => {
                    let message = RawMessage {
                        link_id,
                        sequence: queued.sequence,
                        received_at,
                        payload,
                    };
                    match &mut self.message_handler {
                        HandlerSlot::Attached(handler) => {
                            self.stats.delivered += 1;
                            handler(message);
                        }
                        HandlerSlot::Vacant => {
                            self.stats.unclaimed += 1;
                            debug!(link_id, sequence = queued.sequence, "No message handler attached");
                        }
                    }
                }
                Err(e) => {
                    self.stats.undecodable += 1;
                    warn!(
                        link_id,
                        sequence = queued.sequence,
                        bytes = inbound.len(),
                        error = %e,
                        "Dropping undecodable payload"
                    );
                }
            },
            LinkEvent::Closed => {
                info!(link_id, "Connection closed by peer");
                self.link = None;
                self.transition(ConnectionState::Closed);
            }
            LinkEvent::Failed(error) => self.fail_link(error),
        }
    }

    fn fail_link(&mut self, error: TransportError) {
        let link_id = self.link.take().map(|link| link.id);
        warn!(?link_id, error = %error, "Connection failed");
        self.last_error = Some(error);
        self.transition(ConnectionState::Errored);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug!(from = %self.state, to = %next, "Connection state change");
        self.state = next;
        if let HandlerSlot::Attached(handler) = &mut self.state_handler {
            handler(next);
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state)
            .field("link_id", &self.link_id())
            .field("queue_capacity", &self.queue_capacity)
            .field("last_error", &self.last_error)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Link task: open the socket and forward everything it yields
async fn run_link(
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    endpoint: String,
    handshake: Option<String>,
    mut sender: LinkSender,
    mut shutdown: oneshot::Receiver<()>,
) {
    let forward = async {
        let mut stream = match connector.open(&endpoint, handshake).await {
            Ok(stream) => stream,
            Err(e) => {
                sender.send(LinkEvent::Failed(e)).await;
                return;
            }
        };
        if sender.send(LinkEvent::Opened).await.is_none() {
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(inbound) => {
                    let event = LinkEvent::Message {
                        inbound,
                        received_at: clock.now(),
                    };
                    if sender.send(event).await.is_none() {
                        return;
                    }
                }
                Err(e) => {
                    sender.send(LinkEvent::Failed(e)).await;
                    return;
                }
            }
        }
        sender.send(LinkEvent::Closed).await;
    };

    tokio::select! {
        _ = &mut shutdown => debug!(endpoint = %endpoint, "Link shutdown requested"),
        _ = forward => {}
    }
}
