//! Single-Parent Stream Transforms
//!
//! One node type covers the whole family of single-parent stream
//! operators (map, fallible map, filter, collect, distinct, recover): the
//! operator is a step closure from an incoming try-value to an optional
//! outgoing try-value, where `None` drops the emission.
//!
//! These nodes are always ready after one parent event, so they fire
//! synchronously during the parent's own firing; their rank is the
//! parent's rank plus one.

use std::sync::{Arc, Weak};

use crate::error::TryValue;
use crate::observable::node::{Edge, NodeCore, ObservableNode};

/// A stream node applying a step closure to each parent emission.
pub(crate) struct ProjectStreamNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    core: NodeCore<B>,
    parent: Arc<dyn ObservableNode<A>>,
    edge: Arc<Edge<A>>,
}

impl<A, B> ProjectStreamNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Create a node that emits `step(incoming)` for each parent emission,
    /// dropping it when the step returns `None`.
    pub(crate) fn create<F>(parent: Arc<dyn ObservableNode<A>>, step: F) -> Arc<Self>
    where
        F: Fn(&TryValue<A>) -> Option<TryValue<B>> + Send + Sync + 'static,
    {
        let rank = parent.core().rank() + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let edge = Edge::new(move |value, txn| {
                let Some(node) = weak.upgrade() else { return };
                if let Some(out) = step(value) {
                    node.core.fire(&out, txn);
                }
            });
            Self {
                core: NodeCore::new(rank),
                parent,
                edge,
            }
        })
    }
}

impl<A, B> ObservableNode<B> for ProjectStreamNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<B> {
        &self.core
    }

    fn on_start(&self) {
        self.parent.add_internal_observer(Arc::clone(&self.edge));
    }

    fn on_stop(&self) {
        self.parent.remove_internal_observer(self.edge.id());
    }
}
