//! Event Bus
//!
//! A programmatic stream source: values pushed into the bus are emitted on
//! its stream, each in its own transaction. A bus with no live observers
//! drops emissions silently — an unobserved stream performs no work.

use std::sync::Arc;

use crate::engine::transaction::Transaction;
use crate::error::{ObservableError, TryValue};
use crate::observable::node::{NodeCore, ObservableNode};
use crate::observable::stream::EventStream;

struct EventBusNode<A> {
    core: NodeCore<A>,
}

impl<A> ObservableNode<A> for EventBusNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {}

    fn on_stop(&self) {}
}

/// A programmatic stream source.
pub struct EventBus<A>
where
    A: Clone + Send + Sync + 'static,
{
    node: Arc<EventBusNode<A>>,
}

impl<A> EventBus<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Create a bus with no observers.
    pub fn new() -> Self {
        Self {
            node: Arc::new(EventBusNode {
                core: NodeCore::new(1),
            }),
        }
    }

    /// The stream of values pushed into this bus.
    pub fn events(&self) -> EventStream<A> {
        EventStream {
            node: Arc::clone(&self.node) as Arc<dyn ObservableNode<A>>,
        }
    }

    /// Emit a value downstream, in a transaction of its own.
    pub fn emit(&self, value: A) {
        self.fire(Ok(value));
    }

    /// Emit an error downstream, in a transaction of its own.
    pub fn emit_error(&self, error: ObservableError) {
        self.fire(Err(error));
    }

    fn fire(&self, value: TryValue<A>) {
        if !self.node.core.is_started() {
            tracing::trace!(node = self.node.core.id().raw(), "dropping unobserved emission");
            return;
        }
        let node = Arc::clone(&self.node);
        Transaction::run(move |txn| {
            // Observers may have detached while this transaction was queued.
            if node.core.is_started() {
                node.core.fire(&value, txn);
            }
        });
    }
}

impl<A> Default for EventBus<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for EventBus<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use super::EventBus;

    #[test]
    fn unobserved_emissions_are_dropped() {
        let bus = EventBus::new();
        bus.emit(1);

        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = seen.clone();
        let _sub = bus.events().subscribe_fn(move |v| {
            seen_clone.store(*v, Ordering::SeqCst);
        });

        // The pre-subscription emission is gone.
        assert_eq!(seen.load(Ordering::SeqCst), -1);

        bus.emit(2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observers_are_notified_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(std::sync::RwLock::new(Vec::new()));

        let log_a = log.clone();
        let _a = bus.events().subscribe_fn(move |v| {
            log_a.write().expect("log lock poisoned").push(("a", *v));
        });
        let log_b = log.clone();
        let _b = bus.events().subscribe_fn(move |v| {
            log_b.write().expect("log lock poisoned").push(("b", *v));
        });

        bus.emit(1);
        assert_eq!(
            *log.read().expect("log lock poisoned"),
            vec![("a", 1), ("b", 1)]
        );
    }

    #[test]
    fn cloned_buses_share_the_node() {
        let bus = EventBus::new();
        let clone = bus.clone();

        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let _sub = bus.events().subscribe_fn(move |v| {
            seen_clone.store(*v, Ordering::SeqCst);
        });

        clone.emit(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }
}
