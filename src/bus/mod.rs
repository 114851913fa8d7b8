//! Event bus for WidgetDeck
//!
//! A process-wide publish/subscribe channel keyed by named topics. Each topic
//! carries one typed payload, so `Event` both selects the topic and holds the
//! data. Delivery is synchronous fan-out in subscriber-registration order.
//!
//! - Handlers registered while a publish is in flight are not invoked for
//!   that publish (delivery works on a snapshot of subscribers).
//! - A handler that returns an error or panics is logged; delivery continues
//!   with the remaining subscribers and the publisher never sees the failure.
//!
//! # Example
//!
//! ```rust
//! use widgetdeck::bus::{Event, EventBus, Toast, ToastLevel, Topic};
//!
//! let bus = EventBus::new();
//! let sub = bus.subscribe(Topic::Toast, |event| {
//!     if let Event::Toast(toast) = event {
//!         println!("[{}] {}", toast.level, toast.message);
//!     }
//!     Ok(())
//! });
//!
//! let delivered = bus.publish(Event::Toast(Toast::new("notes", "Saved", ToastLevel::Info)));
//! assert_eq!(delivered, 1);
//!
//! sub.unsubscribe();
//! assert_eq!(bus.subscriber_count(Topic::Toast), 0);
//! ```

mod types;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, warn};

use crate::utils::lock;

pub use types::{
    ActivityEvent, CommandEvent, Event, ThemeChange, Toast, ToastLevel, Topic, WidgetEvent,
};

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    topics: Mutex<HashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, topic: Topic, id: u64) -> bool {
        let mut topics = lock(&self.topics);
        let Some(subs) = topics.get_mut(&topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            topics.remove(&topic);
        }
        removed
    }
}

/// Cheaply cloneable handle to a shared event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `topic`.
    ///
    /// Returns a `Subscription` that removes exactly this registration.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_handler(topic, Arc::new(handler))
    }

    /// Subscribe an already shared handler.
    pub fn subscribe_handler(&self, topic: Topic, handler: Handler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.topics)
            .entry(topic)
            .or_default()
            .push(Subscriber { id, handler });

        debug!(topic = %topic, subscription = id, "Subscribed");

        Subscription {
            topic,
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber of its topic.
    ///
    /// Returns how many handlers completed without error. Publishing to a
    /// topic with no subscribers is a no-op.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let snapshot: Vec<(u64, Handler)> = match lock(&self.inner.topics).get(&topic) {
            Some(subs) => subs
                .iter()
                .map(|s| (s.id, Arc::clone(&s.handler)))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(
                    topic = %topic,
                    subscription = id,
                    error = %e,
                    "Event handler failed"
                ),
                Err(_) => error!(
                    topic = %topic,
                    subscription = id,
                    "Event handler panicked"
                ),
            }
        }
        delivered
    }

    /// Number of subscribers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        lock(&self.inner.topics)
            .get(&topic)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Total number of subscriptions across all topics.
    pub fn total_subscribers(&self) -> usize {
        lock(&self.inner.topics).values().map(|subs| subs.len()).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Capability to remove a single subscription.
///
/// Dropping a `Subscription` does not unsubscribe; call `unsubscribe()`.
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: Topic,
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the subscription. Calling this more than once is a no-op.
    ///
    /// Returns whether a registration was actually removed.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(self.topic, self.id),
            None => false,
        }
    }

    /// The topic this subscription listens on.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn toast(message: &str) -> Event {
        Event::Toast(Toast::new("test", message, ToastLevel::Info))
    }

    fn recorder(bus: &EventBus, log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Subscription {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        bus.subscribe(Topic::Toast, move |_| {
            log.lock().unwrap().push(tag.clone());
            Ok(())
        })
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(toast("nobody home")), 0);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, &log, "first");
        recorder(&bus, &log, "second");
        recorder(&bus, &log, "third");

        assert_eq!(bus.publish(toast("hi")), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe(Topic::Activity, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(toast("not activity"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_subscription() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&bus, &log, "a");
        recorder(&bus, &log, "b");

        assert!(a.unsubscribe());
        bus.publish(toast("x"));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Topic::Toast, |_| Ok(()));
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(bus.subscriber_count(Topic::Toast), 0);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::Toast, |_| anyhow::bail!("handler exploded"));
        recorder(&bus, &log, "after-error");

        assert_eq!(bus.publish(toast("x")), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after-error"]);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::Toast, |_| panic!("handler panicked"));
        recorder(&bus, &log, "after-panic");

        assert_eq!(bus.publish(toast("x")), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after-panic"]);
    }

    #[test]
    fn test_subscriber_added_during_delivery_misses_current_publish() {
        let bus = EventBus::new();
        let late_hits = Arc::new(AtomicUsize::new(0));

        let bus_clone = bus.clone();
        let late = Arc::clone(&late_hits);
        bus.subscribe(Topic::Toast, move |_| {
            let late = Arc::clone(&late);
            bus_clone.subscribe(Topic::Toast, move |_| {
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        bus.publish(toast("first"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(Topic::Toast), 2);

        bus.publish(toast("second"));
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Topic::Toast, |_| Ok(()));
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_total_subscribers() {
        let bus = EventBus::new();
        bus.subscribe(Topic::Toast, |_| Ok(()));
        bus.subscribe(Topic::Activity, |_| Ok(()));
        bus.subscribe(Topic::Activity, |_| Ok(()));
        assert_eq!(bus.total_subscribers(), 3);
        assert_eq!(bus.subscriber_count(Topic::Activity), 2);
    }
}
