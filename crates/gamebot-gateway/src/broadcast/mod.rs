//! Event broadcasting
//!
//! Hands delivered events and lifecycle notifications to subscribers.

mod dispatcher;

pub use dispatcher::{EventDispatcher, EventHandler, LifecycleHandler, SubscriptionId};
