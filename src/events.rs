//! In-process publish/subscribe bus.
//!
//! Decouples the producers ("state refreshed", "button pressed", "motion
//! changed") from the per-service consumers that push values to the host.
//! The bus is owned by the top-level assembly and may carry events for more
//! than one device, so subscribers filter on the device identity themselves.

use crate::state::ButtonAction;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateUpdated,
    ButtonPressed,
    MotionChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A full-state poll was applied to the mirror.
    StateUpdated { device: String },
    /// A button push notification arrived.
    ButtonPressed {
        device: String,
        button: u8,
        action: ButtonAction,
    },
    /// The PIR reading changed.
    MotionChanged { device: String, detected: bool },
}

impl BridgeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StateUpdated { .. } => EventKind::StateUpdated,
            Self::ButtonPressed { .. } => EventKind::ButtonPressed,
            Self::MotionChanged { .. } => EventKind::MotionChanged,
        }
    }

    pub fn device(&self) -> &str {
        match self {
            Self::StateUpdated { device }
            | Self::ButtonPressed { device, .. }
            | Self::MotionChanged { device, .. } => device,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler for one event kind.
    ///
    /// The handler stays registered until the returned [`Subscription`] is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        kind: EventKind,
        handler: impl Fn(&BridgeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        for handlers in self.subscribers.write().values_mut() {
            handlers.retain(|(sub, _)| *sub != id);
        }
    }

    /// Deliver an event to every handler of its kind. Returns the number of handlers called.
    ///
    /// Handlers run outside the subscriber lock and may subscribe or drop
    /// subscriptions themselves.
    pub fn publish(&self, event: &BridgeEvent) -> usize {
        let handlers: Vec<EventHandler> = self
            .subscribers
            .read()
            .get(&event.kind())
            .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }
}

/// Handle of a registered handler; unsubscribes on drop.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: SubscriptionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}
