//! Dashboard session
//!
//! Wires one [`Transport`] to one [`DashboardPipeline`]. The session owns
//! both; inbound payloads and state changes flow into the pipeline on the
//! owner's task, one at a time.
//!
//! Observers must not call back into the session from inside a publication.

use crate::pipeline::{DashboardPipeline, DashboardSummary, Observer, SubscriptionId};
use crate::transport::{ConnectionState, Handshake, Transport};
use crate::usecase::UseCaseConfig;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::Arc;
use tracing::info;

/// Single owner of a live connection and the state derived from it
pub struct DashboardSession {
    transport: Transport,
    pipeline: Rc<RefCell<DashboardPipeline>>,
    endpoint: Option<String>,
    send_handshake: bool,
}

impl DashboardSession {
    /// Attach `pipeline` to `transport`
    ///
    /// Fails if the transport already has handlers attached.
    pub fn new(mut transport: Transport, pipeline: DashboardPipeline) -> crate::Result<Self> {
        let pipeline = Rc::new(RefCell::new(pipeline));

        let sink = Rc::clone(&pipeline);
        transport.on_message(move |message| {
            sink.borrow_mut().ingest(&message);
        })?;

        let sink = Rc::clone(&pipeline);
        transport.on_state_change(move |state| sink.borrow_mut().on_connection_state(state))?;

        Ok(Self {
            transport,
            pipeline,
            endpoint: None,
            send_handshake: true,
        })
    }

    /// Whether `start` sends the `{"useCase": ..}` handshake
    pub fn with_handshake(mut self, send: bool) -> Self {
        self.send_handshake = send;
        self
    }

    /// Connect to `endpoint`; returns false if a connection already exists
    pub fn start(&mut self, endpoint: &str) -> bool {
        self.endpoint = Some(endpoint.to_string());
        let handshake = self.handshake();
        self.transport.connect(endpoint, handshake.as_ref())
    }

    /// Reconnect to the last endpoint after `Closed` or `Errored`
    pub fn reconnect(&mut self) -> bool {
        match self.endpoint.clone() {
            Some(endpoint) => self.start(&endpoint),
            None => false,
        }
    }

    /// Switch to another use case
    ///
    /// The connection is closed before the pipeline is reset and reopened
    /// afterwards, so frames of the old use case never reach the new session.
    /// Returns whether a new connection was started.
    pub fn switch_use_case(
        &mut self,
        use_case: impl Into<Arc<UseCaseConfig>>,
    ) -> crate::Result<bool> {
        let use_case = use_case.into();
        use_case.validate()?;
        info!(use_case = %use_case.id, "Switching use case");

        self.transport.close();
        self.pipeline.borrow_mut().reset(use_case)?;
        Ok(self.reconnect())
    }

    /// Wait for the next transport event and feed it through the pipeline
    ///
    /// Returns false when there is no connection.
    pub async fn pump(&mut self) -> bool {
        self.transport.pump().await
    }

    /// Feed every queued transport event through the pipeline
    pub fn dispatch_pending(&mut self) -> usize {
        self.transport.dispatch_pending()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.pipeline.borrow_mut().subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.pipeline.borrow_mut().unsubscribe(id)
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn pipeline(&self) -> Ref<'_, DashboardPipeline> {
        self.pipeline.borrow()
    }

    pub fn pipeline_mut(&self) -> RefMut<'_, DashboardPipeline> {
        self.pipeline.borrow_mut()
    }

    pub fn summary(&self) -> DashboardSummary {
        self.pipeline.borrow().summary()
    }

    fn handshake(&self) -> Option<Handshake> {
        if self.send_handshake {
            Some(Handshake::new(self.pipeline.borrow().use_case().id.clone()))
        } else {
            None
        }
    }
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("transport", &self.transport)
            .field("endpoint", &self.endpoint)
            .field("send_handshake", &self.send_handshake)
            .finish()
    }
}
