//! Signals
//!
//! The continuous observable variant: a signal always has a current
//! try-value, readable synchronously with [`Signal::try_now`] and replayed
//! to every newly attached observer before `subscribe` returns. Errors
//! latch into the current value; a later successful update overwrites
//! them.

use std::sync::Arc;

use crate::error::TryValue;
use crate::operators::combine::CombineSignalNode;
use crate::operators::debug::{DebugSignalNode, LifecycleHooks};
use crate::operators::map_signal::MapSignalNode;

use super::node::SignalNode;
use super::observer::{subscription_for, Observer, ObserverEntry, Subscription};

/// A continuous observable with a latched current value.
pub struct Signal<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) node: Arc<dyn SignalNode<A>>,
}

impl<A> Signal<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Read the current value synchronously.
    ///
    /// Between transactions this returns the value of the most recent
    /// firing; a signal that has never started computes it on demand.
    pub fn try_now(&self) -> TryValue<A> {
        self.node.try_now()
    }

    /// Attach an observer. Starts the signal if it was dormant, and
    /// synchronously replays the current value to the new observer before
    /// returning.
    pub fn subscribe(&self, observer: Observer<A>) -> Subscription {
        let entry = Arc::new(ObserverEntry::new(observer));
        let id = entry.id();
        self.node.add_external_observer(Arc::clone(&entry));
        entry.notify(&self.node.try_now());
        subscription_for(Arc::clone(&self.node), id)
    }

    /// Attach a value-only observer.
    ///
    /// Error emissions reaching this observer (including a latched error
    /// replayed on subscribe) are reported to the unhandled-error sink.
    pub fn subscribe_fn<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe(Observer::new(on_next))
    }

    /// Apply a pure projection to the signal's value. Error inputs pass
    /// through without invoking the projection.
    pub fn map<B, F>(&self, project: F) -> Signal<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        Signal {
            node: MapSignalNode::create(Arc::clone(&self.node), move |v| Ok(project(v))),
        }
    }

    /// Apply a fallible projection; an `Err` result latches as the
    /// signal's current value.
    pub fn map_result<B, F>(&self, project: F) -> Signal<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&A) -> TryValue<B> + Send + Sync + 'static,
    {
        Signal {
            node: MapSignalNode::create(Arc::clone(&self.node), project),
        }
    }

    /// Combine two signals. The result fires at most once per transaction,
    /// after both inputs have settled, and computes its initial value from
    /// both parents' current values at start.
    pub fn combine_with<B, C, F>(&self, other: &Signal<B>, combine: F) -> Signal<C>
    where
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        Signal {
            node: CombineSignalNode::create(
                Arc::clone(&self.node),
                Arc::clone(&other.node),
                combine,
            ),
        }
    }

    /// Identity passthrough with lifecycle hooks; hook failures go to the
    /// unhandled-error sink.
    pub fn debug_lifecycle(&self, hooks: LifecycleHooks<A>) -> Signal<A> {
        Signal {
            node: DebugSignalNode::create(Arc::clone(&self.node), hooks),
        }
    }
}

impl<A> Clone for Signal<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}
