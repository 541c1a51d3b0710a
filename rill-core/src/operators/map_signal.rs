//! Signal Projection
//!
//! Maps a signal through a projection, producing a signal. The node
//! latches a current value: computed from the parent's current value at
//! start, then recomputed on every parent firing. Error inputs pass
//! through without invoking the projection, and a fallible projection's
//! `Err` result becomes the latched error (recovery on a later success
//! overwrites it).

use std::sync::{Arc, Weak};

use crate::error::TryValue;
use crate::observable::node::{Edge, NodeCore, ObservableNode, SignalMemory, SignalNode};

/// A signal node applying a projection to a parent signal.
pub(crate) struct MapSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    core: NodeCore<B>,
    memory: SignalMemory<B>,
    parent: Arc<dyn SignalNode<A>>,
    project: Arc<dyn Fn(&A) -> TryValue<B> + Send + Sync>,
    edge: Arc<Edge<A>>,
}

impl<A, B> MapSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    pub(crate) fn create<F>(parent: Arc<dyn SignalNode<A>>, project: F) -> Arc<Self>
    where
        F: Fn(&A) -> TryValue<B> + Send + Sync + 'static,
    {
        let rank = parent.core().rank() + 1;
        let project: Arc<dyn Fn(&A) -> TryValue<B> + Send + Sync> = Arc::new(project);
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let edge_project = Arc::clone(&project);
            let edge = Edge::new(move |value: &TryValue<A>, txn| {
                let Some(node) = weak.upgrade() else { return };
                let out = match value {
                    Ok(v) => edge_project(v),
                    Err(e) => Err(e.clone()),
                };
                node.fire_signal(out, txn);
            });
            Self {
                core: NodeCore::new(rank),
                memory: SignalMemory::new(),
                parent,
                project,
                edge,
            }
        })
    }
}

impl<A, B> ObservableNode<B> for MapSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<B> {
        &self.core
    }

    fn on_start(&self) {
        self.parent.add_internal_observer(Arc::clone(&self.edge));
        self.memory.ensure(|| self.current());
    }

    fn on_stop(&self) {
        self.parent.remove_internal_observer(self.edge.id());
    }
}

impl<A, B> SignalNode<B> for MapSignalNode<A, B>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn memory(&self) -> &SignalMemory<B> {
        &self.memory
    }

    fn current(&self) -> TryValue<B> {
        match self.parent.try_now() {
            Ok(v) => (self.project)(&v),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sources::var::Var;

    #[test]
    fn unstarted_map_computes_on_demand() {
        let var = Var::new(4);
        let doubled = var.signal().map(|v| v * 2);
        assert_eq!(doubled.try_now(), Ok(8));
    }

    #[test]
    fn latched_value_tracks_parent_updates() {
        let var = Var::new(1);
        let mapped = var.signal().map(|v| v + 100);

        let _sub = mapped.subscribe_fn(|_| {});
        assert_eq!(mapped.try_now(), Ok(101));

        var.set(7);
        assert_eq!(mapped.try_now(), Ok(107));
    }

    #[test]
    fn restart_preserves_the_latched_value() {
        let var = Var::new(1);
        let mapped = var.signal().map(|v| v * 10);

        let sub = mapped.subscribe_fn(|_| {});
        var.set(3);
        assert_eq!(mapped.try_now(), Ok(30));
        sub.kill();

        // Stopped: the latched value survives.
        assert_eq!(mapped.try_now(), Ok(30));

        let _sub = mapped.subscribe_fn(|_| {});
        assert_eq!(mapped.try_now(), Ok(30));
    }
}
