//! Fold
//!
//! Folds a stream into a signal from a seed: the signal's current value is
//! the accumulator, updated on every parent emission. The accumulator is
//! stored apart from the latched value, so a parent error latches as the
//! signal's current value without destroying the fold state — a later
//! success folds from the last good accumulator.

use std::sync::{Arc, RwLock, Weak};

use crate::error::TryValue;
use crate::observable::node::{Edge, NodeCore, ObservableNode, SignalMemory, SignalNode};

/// A signal node folding a parent stream from a seed.
pub(crate) struct FoldSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    core: NodeCore<B>,
    memory: SignalMemory<B>,
    parent: Arc<dyn ObservableNode<A>>,
    edge: Arc<Edge<A>>,
    seed: B,
    acc: RwLock<Option<B>>,
}

impl<A, B> FoldSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    pub(crate) fn create<F>(parent: Arc<dyn ObservableNode<A>>, seed: B, step: F) -> Arc<Self>
    where
        F: Fn(&B, &A) -> B + Send + Sync + 'static,
    {
        let rank = parent.core().rank() + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let edge = Edge::new(move |value: &TryValue<A>, txn| {
                let Some(node) = weak.upgrade() else { return };
                match value {
                    Ok(v) => {
                        let next = {
                            let mut acc =
                                node.acc.write().expect("fold accumulator lock poisoned");
                            let current = acc.as_ref().unwrap_or(&node.seed);
                            let next = step(current, v);
                            *acc = Some(next.clone());
                            next
                        };
                        node.fire_signal(Ok(next), txn);
                    }
                    Err(e) => node.fire_signal(Err(e.clone()), txn),
                }
            });
            Self {
                core: NodeCore::new(rank),
                memory: SignalMemory::new(),
                parent,
                edge,
                seed,
                acc: RwLock::new(None),
            }
        })
    }

    fn accumulator(&self) -> B {
        self.acc
            .read()
            .expect("fold accumulator lock poisoned")
            .clone()
            .unwrap_or_else(|| self.seed.clone())
    }
}

impl<A, B> ObservableNode<B> for FoldSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<B> {
        &self.core
    }

    fn on_start(&self) {
        self.parent.add_internal_observer(Arc::clone(&self.edge));
        self.memory.ensure(|| Ok(self.accumulator()));
    }

    fn on_stop(&self) {
        self.parent.remove_internal_observer(self.edge.id());
    }
}

impl<A, B> SignalNode<B> for FoldSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn memory(&self) -> &SignalMemory<B> {
        &self.memory
    }

    fn current(&self) -> TryValue<B> {
        Ok(self.accumulator())
    }
}
