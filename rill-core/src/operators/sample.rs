//! Sample-Combine
//!
//! Emits only when the sampling stream fires; at that moment the sampled
//! signal's current value is read synchronously, the combinator applied,
//! and the result emitted. Updates to the sampled signal never trigger
//! this node — it subscribes to the signal with an inert edge purely to
//! keep the signal started, so its current value is live.
//!
//! The node's rank is one greater than the maximum of all parents' ranks,
//! so within a transaction the sampled signal has settled to its
//! post-transaction value before the sample reads it. The buffered
//! sampling value is released after each firing; sampling values do not
//! persist across transactions.

use std::sync::{Arc, RwLock, Weak};

use crate::engine::transaction::{PendingObservable, Transaction};
use crate::error::TryValue;
use crate::observable::node::{Edge, NodeCore, NodeId, ObservableNode, SignalNode};

/// A stream node sampling a signal on each trigger emission.
pub(crate) struct SampleCombineNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    core: NodeCore<C>,
    sampling: Arc<dyn ObservableNode<A>>,
    sampled: Arc<dyn SignalNode<B>>,
    combine: Arc<dyn Fn(&A, &B) -> C + Send + Sync>,
    trigger_edge: Arc<Edge<A>>,
    keep_alive_edge: Arc<Edge<B>>,

    /// The sampling value buffered for the current transaction.
    stash: RwLock<Option<TryValue<A>>>,
}

impl<A, B, C> SampleCombineNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub(crate) fn create<F>(
        sampling: Arc<dyn ObservableNode<A>>,
        sampled: Arc<dyn SignalNode<B>>,
        combine: F,
    ) -> Arc<Self>
    where
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        let rank = sampling.core().rank().max(sampled.core().rank()) + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let trigger_weak = weak.clone();
            let trigger_edge = Edge::new(move |value: &TryValue<A>, txn: &mut Transaction| {
                let Some(node) = trigger_weak.upgrade() else { return };
                *node.stash.write().expect("sample stash lock poisoned") =
                    Some(value.clone());
                txn.enqueue(node);
            });

            Self {
                core: NodeCore::new(rank),
                sampling,
                sampled,
                combine: Arc::new(combine),
                trigger_edge,
                keep_alive_edge: Edge::inert(),
                stash: RwLock::new(None),
            }
        })
    }
}

impl<A, B, C> ObservableNode<C> for SampleCombineNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<C> {
        &self.core
    }

    fn on_start(&self) {
        self.sampling
            .add_internal_observer(Arc::clone(&self.trigger_edge));
        self.sampled
            .add_internal_observer(Arc::clone(&self.keep_alive_edge));
    }

    fn on_stop(&self) {
        self.sampling
            .remove_internal_observer(self.trigger_edge.id());
        self.sampled
            .remove_internal_observer(self.keep_alive_edge.id());
        *self.stash.write().expect("sample stash lock poisoned") = None;
    }
}

impl<A, B, C> PendingObservable for SampleCombineNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn pending_id(&self) -> NodeId {
        self.core.id()
    }

    fn pending_rank(&self) -> u32 {
        self.core.rank()
    }

    fn sync_fire(&self, txn: &mut Transaction) {
        let Some(trigger) = self
            .stash
            .write()
            .expect("sample stash lock poisoned")
            .take()
        else {
            return;
        };

        let out = match trigger {
            Ok(a) => match self.sampled.try_now() {
                Ok(b) => Ok((self.combine)(&a, &b)),
                Err(e) => Err(e),
            },
            // A failed trigger samples nothing.
            Err(e) => Err(e),
        };
        self.core.fire(&out, txn);
    }
}
