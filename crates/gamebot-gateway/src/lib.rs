//! # gamebot-gateway
//!
//! Resumable gateway client: handshake, heartbeat, in-order event delivery,
//! session resume and cold reconnect with backoff.

pub mod bootstrap;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod protocol;
pub mod reconnect;
pub mod resume;
pub mod retry;
pub mod sequencer;
pub mod session;
pub mod transport;

pub use bootstrap::{EndpointResolver, HttpEndpointResolver, StaticEndpoint};
pub use broadcast::{EventDispatcher, EventHandler, LifecycleHandler, SubscriptionId};
pub use client::{ClientSnapshot, ConnectionState, GatewayClient, GatewayClientBuilder};
pub use config::{ClientConfig, HeartbeatConfig, ReconnectConfig, ResumeConfig};
pub use error::{GatewayError, GatewayResult, HandshakeFailure};
pub use events::{EventCategory, GatewayEvent, LifecycleEvent};
pub use sequencer::BufferStatus;
pub use session::SessionInfo;
pub use transport::{Connector, RemoteEnd, Transport, WebSocketConnector};
