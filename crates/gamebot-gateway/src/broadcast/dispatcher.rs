//! Event dispatcher
//!
//! Fans delivered events and lifecycle notifications out to subscribers. Two
//! surfaces exist: registered handlers and raw broadcast receivers for
//! consumers that prefer a stream.
//!
//! Every handler gets its own queue and worker task. The worker awaits one call
//! at a time, so a handler sees events in the order they were dispatched, while
//! a slow, failing or panicking handler holds up nobody but itself.

use crate::events::{EventCategory, GatewayEvent, LifecycleEvent};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Handle returned by registration, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receives inbound events
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: GatewayEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(GatewayEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: GatewayEvent) -> anyhow::Result<()> {
        self(event).await
    }
}

/// Receives lifecycle notifications
#[async_trait]
pub trait LifecycleHandler: Send + Sync + 'static {
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> LifecycleHandler for F
where
    F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self(event).await
    }
}

/// What a subscription worker calls for each queued item
trait Deliver<T>: Send + Sync {
    fn deliver(&self, item: T) -> BoxFuture<'_, anyhow::Result<()>>;
}

impl Deliver<GatewayEvent> for dyn EventHandler {
    fn deliver(&self, event: GatewayEvent) -> BoxFuture<'_, anyhow::Result<()>> {
        self.handle(event)
    }
}

impl Deliver<LifecycleEvent> for dyn LifecycleHandler {
    fn deliver(&self, event: LifecycleEvent) -> BoxFuture<'_, anyhow::Result<()>> {
        self.handle(event)
    }
}

/// Drain `queue` into `handler`, one call at a time, until unsubscribed
fn spawn_worker<T, H>(id: SubscriptionId, handler: Arc<H>, mut queue: mpsc::UnboundedReceiver<T>)
where
    T: Send + 'static,
    H: Deliver<T> + ?Sized + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = queue.recv().await {
            match AssertUnwindSafe(handler.deliver(item)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(subscription = id.0, error = %e, "Handler failed");
                }
                Err(_) => {
                    tracing::warn!(subscription = id.0, "Handler panicked");
                }
            }
        }
        tracing::trace!(subscription = id.0, "Handler worker stopped");
    });
}

struct EventSubscription {
    id: SubscriptionId,
    /// `None` receives every category
    category: Option<EventCategory>,
    queue: mpsc::UnboundedSender<GatewayEvent>,
}

struct LifecycleSubscription {
    id: SubscriptionId,
    queue: mpsc::UnboundedSender<LifecycleEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: Vec<EventSubscription>,
    lifecycle: Vec<LifecycleSubscription>,
}

impl Registry {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

/// Publish/subscribe hub for one client
pub struct EventDispatcher {
    registry: RwLock<Registry>,
    events_tx: broadcast::Sender<GatewayEvent>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher whose broadcast channels hold `capacity` items
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(capacity.max(1));
        let (lifecycle_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: RwLock::new(Registry::default()),
            events_tx,
            lifecycle_tx,
        }
    }

    /// Create a shared dispatcher
    #[must_use]
    pub fn new_shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Run `handler` for every event of `category`
    ///
    /// Registration spawns the handler's worker, so it must happen inside a
    /// tokio runtime.
    pub fn on_event<H: EventHandler>(&self, category: EventCategory, handler: H) -> SubscriptionId {
        self.register_event(Some(category), Arc::new(handler))
    }

    /// Run `handler` for every event
    pub fn on_any_event<H: EventHandler>(&self, handler: H) -> SubscriptionId {
        self.register_event(None, Arc::new(handler))
    }

    /// Run `handler` for every lifecycle notification
    pub fn on_lifecycle<H: LifecycleHandler>(&self, handler: H) -> SubscriptionId {
        let handler: Arc<dyn LifecycleHandler> = Arc::new(handler);
        let (queue, pending) = mpsc::unbounded_channel();

        let mut registry = self.registry.write();
        let id = registry.next_id();
        registry.lifecycle.push(LifecycleSubscription { id, queue });
        spawn_worker(id, handler, pending);
        id
    }

    /// Remove a handler; returns whether it was registered
    ///
    /// Items already queued for the handler are still delivered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write();
        let before = registry.events.len() + registry.lifecycle.len();
        registry.events.retain(|sub| sub.id != id);
        registry.lifecycle.retain(|sub| sub.id != id);
        before != registry.events.len() + registry.lifecycle.len()
    }

    /// Stream of delivered events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events_tx.subscribe()
    }

    /// Stream of lifecycle notifications
    #[must_use]
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    /// Publish an event; returns how many handlers it was queued for
    pub fn dispatch_event(&self, event: GatewayEvent) -> usize {
        let queued = {
            let registry = self.registry.read();
            registry
                .events
                .iter()
                .filter(|sub| sub.category.is_none_or(|category| category == event.category))
                .map(|sub| sub.queue.send(event.clone()).is_ok())
                .filter(|sent| *sent)
                .count()
        };

        tracing::trace!(
            sn = ?event.sn,
            category = %event.category,
            handlers = queued,
            "Dispatching event"
        );

        let _ = self.events_tx.send(event);
        queued
    }

    /// Publish a lifecycle notification
    pub fn dispatch_lifecycle(&self, event: LifecycleEvent) {
        {
            let registry = self.registry.read();
            for sub in &registry.lifecycle {
                let _ = sub.queue.send(event.clone());
            }
        }

        let _ = self.lifecycle_tx.send(event);
    }

    fn register_event(
        &self,
        category: Option<EventCategory>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let (queue, pending) = mpsc::unbounded_channel();

        let mut registry = self.registry.write();
        let id = registry.next_id();
        registry.events.push(EventSubscription {
            id,
            category,
            queue,
        });
        spawn_worker(id, handler, pending);
        id
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("EventDispatcher")
            .field("event_handlers", &registry.events.len())
            .field("lifecycle_handlers", &registry.lifecycle.len())
            .finish_non_exhaustive()
    }
}
