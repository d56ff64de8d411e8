//! Connection Orchestrator
//!
//! [`GatewayClient`] is the handle applications hold. It forwards `connect` and
//! `disconnect` to the orchestrator task, reads state from a watch channel and
//! exposes the event dispatcher for subscriptions.

mod actor;
mod state;


pub use state::{ClientSnapshot, ConnectionState};

use crate::bootstrap::{Bootstrap, EndpointResolver};
use crate::broadcast::{EventDispatcher, EventHandler, LifecycleHandler, SubscriptionId};
use crate::config::ClientConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventCategory, GatewayEvent, LifecycleEvent};
use crate::sequencer::BufferStatus;
use crate::session::SessionInfo;
use crate::transport::{Connector, WebSocketConnector};
use actor::{ClientActor, Command};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Command channel size
const COMMAND_BUFFER_SIZE: usize = 16;

/// Builder for [`GatewayClient`]
pub struct GatewayClientBuilder {
    config: ClientConfig,
    resolver: Option<Arc<dyn EndpointResolver>>,
    connector: Option<Arc<dyn Connector>>,
}

impl GatewayClientBuilder {
    /// Endpoint resolver (required)
    #[must_use]
    pub fn resolver(mut self, resolver: impl EndpointResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Transport connector (defaults to [`WebSocketConnector`])
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Spawn the orchestrator task; must be called inside a tokio runtime
    pub fn build(self) -> GatewayResult<GatewayClient> {
        let resolver = self.resolver.ok_or_else(|| {
            GatewayError::InvalidEndpoint("no endpoint resolver configured".to_string())
        })?;
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WebSocketConnector),
        };

        let bootstrap = Arc::new(Bootstrap::new(
            resolver,
            connector,
            self.config.open_retry_delays.clone(),
        ));
        let dispatcher = EventDispatcher::new_shared(self.config.broadcast_capacity);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(ClientSnapshot::default());

        let actor = ClientActor::new(
            self.config,
            bootstrap,
            Arc::clone(&dispatcher),
            snapshot_tx,
            commands_rx,
        );
        tokio::spawn(actor.run());

        Ok(GatewayClient {
            commands: commands_tx,
            snapshot: snapshot_rx,
            dispatcher,
        })
    }
}

/// Handle to a gateway connection
///
/// Dropping the handle shuts the connection down.
#[derive(Debug)]
pub struct GatewayClient {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ClientSnapshot>,
    dispatcher: Arc<EventDispatcher>,
}

impl GatewayClient {
    /// Start configuring a client
    #[must_use]
    pub fn builder(config: ClientConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            config,
            resolver: None,
            connector: None,
        }
    }

    /// Start a connection cycle
    ///
    /// Returns once the cycle has started; watch [`LifecycleEvent`]s or use
    /// [`GatewayClient::wait_for_state`] to learn how it ends. Fails with
    /// `AlreadyConnected` unless the client is disconnected.
    pub async fn connect(&self) -> GatewayResult<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect(reply))
            .await
            .map_err(|_| GatewayError::ClientClosed)?;
        response.await.map_err(|_| GatewayError::ClientClosed)?
    }

    /// Close the connection and cancel every pending timer and retry
    pub async fn disconnect(&self) -> GatewayResult<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Disconnect(reply))
            .await
            .map_err(|_| GatewayError::ClientClosed)?;
        response.await.map_err(|_| GatewayError::ClientClosed)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    /// The current session, if any
    #[must_use]
    pub fn session(&self) -> Option<SessionInfo> {
        self.snapshot.borrow().session.clone()
    }

    #[must_use]
    pub fn buffer_status(&self) -> BufferStatus {
        self.snapshot.borrow().buffer.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> ClientSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until the client reaches `state`
    pub async fn wait_for_state(&self, state: ConnectionState) -> GatewayResult<()> {
        let mut snapshot = self.snapshot.clone();
        snapshot
            .wait_for(|current| current.state == state)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::ClientClosed)
    }

    // === Subscriptions ===

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Run `handler` for every event of `category`
    pub fn on_event<H: EventHandler>(&self, category: EventCategory, handler: H) -> SubscriptionId {
        self.dispatcher.on_event(category, handler)
    }

    /// Run `handler` for every event
    pub fn on_any_event<H: EventHandler>(&self, handler: H) -> SubscriptionId {
        self.dispatcher.on_any_event(handler)
    }

    /// Run `handler` for every lifecycle notification
    pub fn on_lifecycle<H: LifecycleHandler>(&self, handler: H) -> SubscriptionId {
        self.dispatcher.on_lifecycle(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Stream of delivered events, in sequence order
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.dispatcher.events()
    }

    /// Stream of lifecycle notifications
    #[must_use]
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.dispatcher.lifecycle()
    }
}
