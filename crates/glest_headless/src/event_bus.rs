//! Fan-out of tick events to observers.
//!
//! Subscribers register a callback per [`GameEventKind`]. After each tick
//! the simulation thread publishes the tick's events in creation order;
//! for each event, callbacks run in subscription order. Callbacks run on
//! the simulation thread while it holds the world's read lock, so they
//! receive the post-tick world and must not block.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glest_core::events::{GameEvent, GameEventKind};
use glest_core::world::World;
use parking_lot::RwLock;
use serde::Serialize;

/// Observer callback.
pub type EventCallback = Arc<dyn Fn(&GameEvent, &World) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: EventCallback,
}

/// Typed publish/subscribe for [`GameEvent`]s.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    delivered: AtomicU64,
    subscribers: RwLock<BTreeMap<GameEventKind, Vec<Subscriber>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("delivered", &self.delivered())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one kind of event.
    pub fn subscribe<F>(&self, kind: GameEventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&GameEvent, &World) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        tracing::debug!(?kind, subscription = id.0, "Subscribed");
        id
    }

    /// Register one callback for several kinds; returns one handle per kind.
    pub fn subscribe_many<F>(&self, kinds: &[GameEventKind], callback: F) -> Vec<SubscriptionId>
    where
        F: Fn(&GameEvent, &World) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        kinds
            .iter()
            .map(|&kind| {
                let callback = Arc::clone(&callback);
                self.subscribe(kind, move |event, world| callback(event, world))
            })
            .collect()
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            if let Some(index) = list.iter().position(|s| s.id == id) {
                list.remove(index);
                tracing::debug!(subscription = id.0, "Unsubscribed");
                return true;
            }
        }
        false
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }

    /// Callback invocations so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Deliver `events` in order.
    ///
    /// The subscriber list is sampled per event, so a callback may
    /// subscribe or unsubscribe without deadlocking; the change applies
    /// from the next event on.
    pub fn publish(&self, events: &[GameEvent], world: &World) {
        for event in events {
            let callbacks: Vec<EventCallback> = match self.subscribers.read().get(&event.kind()) {
                Some(list) => list.iter().map(|s| Arc::clone(&s.callback)).collect(),
                None => continue,
            };
            for callback in &callbacks {
                callback(event, world);
            }
            self.delivered
                .fetch_add(callbacks.len() as u64, Ordering::Relaxed);
        }
    }
}
