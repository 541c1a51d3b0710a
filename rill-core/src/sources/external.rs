//! External Sources
//!
//! A stream source wired to an external producer (a socket, a timer, a
//! DOM event target). The wiring callback runs on start, receiving a
//! [`SourceHandle`] the producer uses to inject values; the teardown
//! callback runs on stop.
//!
//! # Contract for Producers
//!
//! - Wire the producer's handlers on start; inject each inbound value or
//!   failure through the handle, which opens a transaction per injection.
//! - On a failure the producer did not initiate (e.g. a remote close),
//!   inject the corresponding error — observers decide how to react.
//! - On stop, clear the local producer reference *before* closing it, so
//!   a synchronously invoked close handler finds nothing to inject into.
//!
//! A handle outliving its stream is inert: injecting through it is a
//! no-op, so racy teardowns degrade silently instead of panicking.

use std::sync::{Arc, Weak};

use crate::engine::transaction::Transaction;
use crate::error::{ObservableError, TryValue};
use crate::observable::node::{NodeCore, ObservableNode};
use crate::observable::stream::EventStream;

type WireFn<A> = Box<dyn Fn(&SourceHandle<A>) + Send + Sync>;
type UnwireFn = Box<dyn Fn() + Send + Sync>;

pub(crate) struct ExternalSourceNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    core: NodeCore<A>,
    handle: SourceHandle<A>,
    wire: WireFn<A>,
    unwire: UnwireFn,
}

impl<A> ObservableNode<A> for ExternalSourceNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {
        tracing::debug!(node = self.core.id().raw(), "wiring external source");
        (self.wire)(&self.handle);
    }

    fn on_stop(&self) {
        tracing::debug!(node = self.core.id().raw(), "unwiring external source");
        (self.unwire)();
    }
}

/// Injection handle held by an external producer.
pub struct SourceHandle<A>
where
    A: Clone + Send + Sync + 'static,
{
    node: Weak<ExternalSourceNode<A>>,
}

impl<A> SourceHandle<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Inject a value, opening a transaction.
    pub fn fire(&self, value: A) {
        self.inject(Ok(value));
    }

    /// Inject an error, opening a transaction.
    pub fn fire_error(&self, error: ObservableError) {
        self.inject(Err(error));
    }

    /// Whether the source stream is still alive and started.
    pub fn is_live(&self) -> bool {
        self.node
            .upgrade()
            .map(|node| node.core.is_started())
            .unwrap_or(false)
    }

    fn inject(&self, value: TryValue<A>) {
        let Some(node) = self.node.upgrade() else { return };
        if !node.core.is_started() {
            return;
        }
        Transaction::run(move |txn| {
            if node.core.is_started() {
                node.core.fire(&value, txn);
            }
        });
    }
}

impl<A> Clone for SourceHandle<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Weak::clone(&self.node),
        }
    }
}

impl<A> EventStream<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Create a stream backed by an external producer.
    ///
    /// `wire` runs when the stream starts, receiving the injection handle;
    /// `unwire` runs when the stream stops.
    pub fn from_external<W, U>(wire: W, unwire: U) -> EventStream<A>
    where
        W: Fn(&SourceHandle<A>) + Send + Sync + 'static,
        U: Fn() + Send + Sync + 'static,
    {
        let node = Arc::new_cyclic(|weak: &Weak<ExternalSourceNode<A>>| ExternalSourceNode {
            core: NodeCore::new(1),
            handle: SourceHandle { node: weak.clone() },
            wire: Box::new(wire),
            unwire: Box::new(unwire),
        });
        EventStream { node }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Arc, RwLock};

    use crate::error::ObservableError;
    use crate::observable::observer::Observer;
    use crate::observable::stream::EventStream;

    use super::SourceHandle;

    #[test]
    fn wires_on_start_and_unwires_on_stop() {
        let wired = Arc::new(AtomicI32::new(0));
        let unwired = Arc::new(AtomicI32::new(0));

        let wired_clone = wired.clone();
        let unwired_clone = unwired.clone();
        let stream: EventStream<i32> = EventStream::from_external(
            move |_| {
                wired_clone.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                unwired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(wired.load(Ordering::SeqCst), 0);

        let sub = stream.subscribe_fn(|_| {});
        assert_eq!(wired.load(Ordering::SeqCst), 1);

        sub.kill();
        assert_eq!(unwired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_injects_values_and_errors() {
        let stash: Arc<RwLock<Option<SourceHandle<i32>>>> = Arc::new(RwLock::new(None));

        let stash_clone = stash.clone();
        let stream = EventStream::from_external(
            move |handle: &SourceHandle<i32>| {
                *stash_clone.write().expect("stash lock poisoned") = Some(handle.clone());
            },
            || {},
        );

        let values = Arc::new(RwLock::new(Vec::new()));
        let errors = Arc::new(AtomicI32::new(0));
        let values_clone = values.clone();
        let errors_clone = errors.clone();
        let _sub = stream.subscribe(Observer::with_error(
            move |v: &i32| {
                values_clone.write().expect("values lock poisoned").push(*v);
            },
            move |_| {
                errors_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let handle = stash
            .read()
            .expect("stash lock poisoned")
            .as_ref()
            .cloned();
        let handle = handle.expect("wire callback ran on start");
        assert!(handle.is_live());

        handle.fire(1);
        handle.fire(2);
        handle.fire_error(ObservableError::ConnectionClosed);

        assert_eq!(*values.read().expect("values lock poisoned"), vec![1, 2]);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_stale_handle_is_inert() {
        let stash: Arc<RwLock<Option<SourceHandle<i32>>>> = Arc::new(RwLock::new(None));

        let stash_clone = stash.clone();
        let stream = EventStream::from_external(
            move |handle: &SourceHandle<i32>| {
                *stash_clone.write().expect("stash lock poisoned") = Some(handle.clone());
            },
            || {},
        );

        let sub = stream.subscribe_fn(|_| {});
        let handle = stash
            .read()
            .expect("stash lock poisoned")
            .as_ref()
            .cloned()
            .expect("wire callback ran on start");

        sub.kill();
        assert!(!handle.is_live());
        // No observers, no panic, no effect.
        handle.fire(99);
    }
}
