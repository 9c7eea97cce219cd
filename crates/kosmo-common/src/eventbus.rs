//! In-process publish/subscribe bus for progress events
//!
//! Handlers are invoked synchronously, in registration order, on the
//! publishing thread. Publish snapshots the subscriber list before
//! invoking anything, so handlers may subscribe or unsubscribe freely
//! without deadlocking the bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::events::{Event, EventId};

/// A subscriber callback
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`Bus::subscribe`], used to unsubscribe later
#[derive(Debug)]
pub struct Subscription {
    event_id: EventId,
    token: u64,
}

#[derive(Default)]
struct Registry {
    subscribers: Mutex<HashMap<EventId, Vec<(u64, EventHandler)>>>,
    next_token: AtomicU64,
}

/// Cheaply cloneable event bus
///
/// Clones share the same subscriber registry.
#[derive(Clone, Default)]
pub struct Bus {
    registry: Arc<Registry>,
}

impl Bus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events with the given id
    pub fn subscribe(&self, event_id: EventId, handler: EventHandler) -> Subscription {
        let token = self.registry.next_token.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .entry(event_id)
            .or_default()
            .push((token, handler));
        Subscription { event_id, token }
    }

    /// Remove a previously registered handler
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handlers) = subscribers.get_mut(&subscription.event_id) {
            handlers.retain(|(token, _)| *token != subscription.token);
        }
    }

    /// Deliver an event to all handlers registered for its id
    ///
    /// The handler list is snapshotted under the lock and invoked after
    /// releasing it; a handler registered while a publish is in flight
    /// will only see subsequent events.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<EventHandler> = {
            let subscribers = self
                .registry
                .subscribers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            subscribers
                .get(&event.id())
                .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in snapshot {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_handler(log: Arc<Mutex<Vec<String>>>, tag: &str) -> EventHandler {
        let tag = tag.to_string();
        Arc::new(move |event: &Event| {
            log.lock()
                .unwrap()
                .push(format!("{tag}:{}", event.message()));
        })
    }

    /// Story: handlers fire in the order they subscribed, and only for
    /// the event id they subscribed to.
    #[test]
    fn story_handlers_fire_in_registration_order() {
        let bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(EventId::Done, recording_handler(Arc::clone(&log), "first"));
        bus.subscribe(EventId::Done, recording_handler(Arc::clone(&log), "second"));
        bus.subscribe(
            EventId::Warning,
            recording_handler(Arc::clone(&log), "warn"),
        );

        bus.publish(Event::done("namespace created"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:namespace created", "second:namespace created"]
        );
    }

    /// Story: unsubscribing stops delivery without disturbing the other
    /// handlers on the same event id.
    #[test]
    fn story_unsubscribe_stops_delivery() {
        let bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = bus.subscribe(EventId::Done, recording_handler(Arc::clone(&log), "first"));
        bus.subscribe(EventId::Done, recording_handler(Arc::clone(&log), "second"));

        bus.publish(Event::done("one"));
        bus.unsubscribe(first);
        bus.publish(Event::done("two"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:one", "second:one", "second:two"]
        );
    }

    /// Story: a handler that subscribes another handler during publish
    /// does not deadlock, and the new handler misses the in-flight event.
    #[test]
    fn story_subscribing_during_publish_misses_current_event() {
        let bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let inner_log = Arc::clone(&log);
        bus.subscribe(
            EventId::Done,
            Arc::new(move |_event: &Event| {
                inner_bus.subscribe(EventId::Done, recording_handler(Arc::clone(&inner_log), "late"));
            }),
        );

        bus.publish(Event::done("first"));
        assert!(log.lock().unwrap().is_empty());

        bus.publish(Event::done("second"));
        assert_eq!(*log.lock().unwrap(), vec!["late:second"]);
    }

    /// Story: clones of the bus share one registry, so a pipeline holding
    /// a clone reaches the handlers the CLI registered.
    #[test]
    fn story_clones_share_subscribers() {
        let bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventId::StartWait,
            recording_handler(Arc::clone(&log), "ui"),
        );

        let pipeline_handle = bus.clone();
        pipeline_handle.publish(Event::start_wait("installing runtime"));

        assert_eq!(*log.lock().unwrap(), vec!["ui:installing runtime"]);
    }
}
