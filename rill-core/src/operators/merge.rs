//! Merge
//!
//! Emits the union of events from N parent streams of the same type.
//!
//! # Protocol
//!
//! When a parent delivers during a transaction, the value is pushed onto a
//! per-instance queue tagged with the parent's rank, and the merge node
//! enqueues itself in the transaction (only if absent — the membership
//! check lives in the transaction). On `sync_fire` the queue drains in
//! full, in parent-rank order with FIFO among equal ranks.
//!
//! A node may fire at most once per transaction, so when the queue holds
//! more than one value the first fires in the current transaction and each
//! additional value opens a new transaction of its own. Parents that
//! co-fire inside a common ancestor's transaction are therefore
//! serialized, never dropped.

use std::sync::{Arc, RwLock, Weak};

use crate::engine::transaction::{PendingObservable, Transaction};
use crate::error::TryValue;
use crate::observable::node::{Edge, NodeCore, NodeId, ObservableNode};

/// A stream node merging N same-typed parents.
pub(crate) struct MergeStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    core: NodeCore<A>,
    parents: Vec<Arc<dyn ObservableNode<A>>>,
    edges: Vec<Arc<Edge<A>>>,
    self_weak: Weak<Self>,

    /// Values delivered by parents in the current transaction, tagged with
    /// the delivering parent's rank.
    queue: RwLock<Vec<(u32, TryValue<A>)>>,
}

impl<A> MergeStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn create(parents: Vec<Arc<dyn ObservableNode<A>>>) -> Arc<Self> {
        let rank = parents
            .iter()
            .map(|p| p.core().rank())
            .max()
            .unwrap_or(0)
            + 1;

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let edges = parents
                .iter()
                .map(|parent| {
                    let weak = weak.clone();
                    let parent_rank = parent.core().rank();
                    Edge::new(move |value: &TryValue<A>, txn: &mut Transaction| {
                        let Some(node) = weak.upgrade() else { return };
                        node.queue
                            .write()
                            .expect("merge queue lock poisoned")
                            .push((parent_rank, value.clone()));
                        txn.enqueue(node);
                    })
                })
                .collect();

            Self {
                core: NodeCore::new(rank),
                parents,
                edges,
                self_weak: weak.clone(),
                queue: RwLock::new(Vec::new()),
            }
        })
    }
}

impl<A> ObservableNode<A> for MergeStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {
        for (parent, edge) in self.parents.iter().zip(&self.edges) {
            parent.add_internal_observer(Arc::clone(edge));
        }
    }

    fn on_stop(&self) {
        for (parent, edge) in self.parents.iter().zip(&self.edges) {
            parent.remove_internal_observer(edge.id());
        }
        // Streams carry no state between stops; values stashed for a node
        // that stopped mid-transaction are dropped.
        self.queue
            .write()
            .expect("merge queue lock poisoned")
            .clear();
    }
}

impl<A> PendingObservable for MergeStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn pending_id(&self) -> NodeId {
        self.core.id()
    }

    fn pending_rank(&self) -> u32 {
        self.core.rank()
    }

    fn sync_fire(&self, txn: &mut Transaction) {
        let mut buffered = std::mem::take(
            &mut *self.queue.write().expect("merge queue lock poisoned"),
        );
        // Parent-rank order; the stable sort preserves arrival order among
        // equal ranks.
        buffered.sort_by_key(|(rank, _)| *rank);

        let mut values = buffered.into_iter().map(|(_, value)| value);
        let Some(first) = values.next() else { return };
        self.core.fire(&first, txn);

        // Each additional value is serialized into a transaction of its
        // own, preserving the one-event-per-node-per-transaction rule.
        for value in values {
            let Some(node) = self.self_weak.upgrade() else { break };
            Transaction::run(move |t| {
                if node.core.is_started() {
                    node.core.fire(&value, t);
                }
            });
        }
    }
}
