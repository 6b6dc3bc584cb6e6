//! In-process publish/subscribe event bus.
//!
//! The bus is a pure observation side-channel: publishers fan events out
//! to subscribers synchronously, on the publishing task, and the bus
//! retains nothing after delivery. Handlers for one kind run in
//! registration order; a failing handler never prevents the remaining
//! handlers from running.
//!
//! The registration map sits behind one global read-write lock. Publishes
//! take the read lock, so concurrent publishes of any kinds proceed in
//! parallel, but a handler that blocks holds up writers (subscribe,
//! unsubscribe, close) until it returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use lockstep_types::{Event, EventKind};

/// The result a subscriber callback returns to the bus.
pub type HandlerResult = anyhow::Result<()>;

type HandlerFn = Box<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

/// Registration identity for a subscribed handler, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// One failed handler invocation from a publish call.
#[derive(Debug)]
pub struct HandlerFailure {
    /// The failing subscriber.
    pub subscriber: SubscriberId,
    /// The error the handler returned, rendered.
    pub message: String,
}

/// Errors returned by [`EventBus::publish`].
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// One or more handlers failed; every handler was still invoked.
    #[error("{count} handler(s) failed publishing {kind} event", count = failures.len())]
    Handlers {
        /// The kind of the published event.
        kind: EventKind,
        /// Every handler failure, in delivery order.
        failures: Vec<HandlerFailure>,
    },
}

struct Subscriber {
    id: SubscriberId,
    handler: HandlerFn,
}

#[derive(Default)]
struct BusInner {
    closed: bool,
    handlers: HashMap<EventKind, Vec<Subscriber>>,
}

/// Decoupled, synchronous, best-effort fan-out notification.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    inner: RwLock<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers for a kind are invoked in registration order. The same
    /// closure may be registered more than once; each registration gets
    /// its own [`SubscriberId`]. Registrations on a closed bus are
    /// accepted but discarded.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriberId
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.write();
        if !inner.closed {
            inner.handlers.entry(kind).or_default().push(Subscriber {
                id,
                handler: Box::new(handler),
            });
        }
        id
    }

    /// Deliver an event to every handler registered for its kind, in
    /// registration order, on the calling task.
    ///
    /// Handler failures do not short-circuit delivery: every remaining
    /// handler still runs, and all failures are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Handlers`] if one or more handlers failed.
    pub fn publish(&self, event: &Event) -> Result<(), BusError> {
        let inner = self.read();
        let Some(subscribers) = inner.handlers.get(&event.kind) else {
            return Ok(());
        };

        let mut failures = Vec::new();
        for subscriber in subscribers {
            if let Err(error) = (subscriber.handler)(event) {
                failures.push(HandlerFailure {
                    subscriber: subscriber.id,
                    message: format!("{error:#}"),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError::Handlers {
                kind: event.kind,
                failures,
            })
        }
    }

    /// Remove the registration with the given id from the given kind.
    ///
    /// Removes at most one registration. Returns whether one was removed.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriberId) -> bool {
        let mut inner = self.write();
        let Some(subscribers) = inner.handlers.get_mut(&kind) else {
            return false;
        };
        let Some(position) = subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        subscribers.remove(position);
        true
    }

    /// Discard all registrations and refuse future ones.
    ///
    /// Not reversible. Subsequent publishes succeed with no handlers
    /// invoked.
    pub fn close(&self) {
        let mut inner = self.write();
        inner.closed = true;
        inner.handlers.clear();
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// Number of registrations for a kind (diagnostics).
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.read().handlers.get(&kind).map_or(0, Vec::len)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BusInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BusInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.read();
        f.debug_struct("EventBus")
            .field("closed", &inner.closed)
            .field("kinds", &inner.handlers.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn event(kind: EventKind) -> Event {
        Event::new(kind, "test")
    }

    #[test]
    fn publish_with_no_subscribers_succeeds() {
        let bus = EventBus::new();
        assert!(bus.publish(&event(EventKind::AgentAction)).is_ok());
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(EventKind::AgentAction, move |_| {
                order.lock().unwrap().push(label);
                Ok(())
            });
        }

        bus.publish(&event(EventKind::AgentAction)).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_handler_does_not_short_circuit() {
        let bus = EventBus::new();
        let second_ran = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::AgentAction, |_| {
            Err(anyhow::anyhow!("handler exploded"))
        });
        let ran = Arc::clone(&second_ran);
        bus.subscribe(EventKind::AgentAction, move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result = bus.publish(&event(EventKind::AgentAction));
        assert_eq!(second_ran.load(Ordering::SeqCst), 1);
        let Err(BusError::Handlers { failures, .. }) = result else {
            unreachable!("expected handler failure");
        };
        assert_eq!(failures.len(), 1);
        assert!(
            failures
                .first()
                .is_some_and(|f| f.message.contains("handler exploded"))
        );
    }

    #[test]
    fn delivery_is_keyed_by_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::AgentJoined, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&event(EventKind::AgentAction)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.publish(&event(EventKind::AgentJoined)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_at_most_one_registration() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let make_handler = |hits: &Arc<AtomicUsize>| {
            let hits = Arc::clone(hits);
            move |_: &Event| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let first = bus.subscribe(EventKind::AgentAction, make_handler(&hits));
        let _second = bus.subscribe(EventKind::AgentAction, make_handler(&hits));

        assert!(bus.unsubscribe(EventKind::AgentAction, first));
        assert_eq!(bus.subscriber_count(EventKind::AgentAction), 1);

        bus.publish(&event(EventKind::AgentAction)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Unsubscribing the same id again is a no-op.
        assert!(!bus.unsubscribe(EventKind::AgentAction, first));
    }

    #[test]
    fn unsubscribe_unknown_kind_is_noop() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventKind::AgentAction, |_| Ok(()));
        assert!(!bus.unsubscribe(EventKind::AgentLeft, id));
    }

    #[test]
    fn close_discards_everything() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::AgentAction, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.close();
        assert!(bus.is_closed());
        assert!(bus.publish(&event(EventKind::AgentAction)).is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Registrations after close are discarded.
        bus.subscribe(EventKind::AgentAction, |_| Ok(()));
        assert_eq!(bus.subscriber_count(EventKind::AgentAction), 0);
    }
}
