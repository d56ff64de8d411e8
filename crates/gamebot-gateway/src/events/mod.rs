//! Gateway events
//!
//! Inbound events delivered in order, and lifecycle notifications.

mod event_types;
mod lifecycle;

pub use event_types::{EventCategory, GatewayEvent, SYSTEM_MESSAGE_TYPE};
pub use lifecycle::LifecycleEvent;
