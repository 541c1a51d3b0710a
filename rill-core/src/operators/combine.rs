//! Combine
//!
//! Two-input combinators: signal x signal -> signal and stream x stream ->
//! stream. Either parent firing makes the node pending; the rank-ordered
//! drain guarantees that by the time the node fires, every parent that
//! fires in the transaction has already done so — so the node fires once,
//! with a consistent snapshot of both inputs, even across diamonds.
//!
//! Error inputs short-circuit the combinator: any error input produces an
//! error output, and when both inputs are errors the left parent's wins.
//!
//! The signal variant reads its parents' current values at fire time and
//! computes its initial value from them at start. The stream variant keeps
//! a latest-value slot per parent, stays silent until every slot is
//! populated, and clears the slots on stop (streams carry no state between
//! stops).

use std::sync::{Arc, RwLock, Weak};

use crate::engine::transaction::{PendingObservable, Transaction};
use crate::error::TryValue;
use crate::observable::node::{
    Edge, NodeCore, NodeId, ObservableNode, SignalMemory, SignalNode,
};

fn combined<A, B, C>(
    left: &TryValue<A>,
    right: &TryValue<B>,
    combine: &(dyn Fn(&A, &B) -> C + Send + Sync),
) -> TryValue<C> {
    match (left, right) {
        (Ok(a), Ok(b)) => Ok(combine(a, b)),
        (Err(e), _) => Err(e.clone()),
        (_, Err(e)) => Err(e.clone()),
    }
}

/// A signal node combining two parent signals.
pub(crate) struct CombineSignalNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    core: NodeCore<C>,
    memory: SignalMemory<C>,
    left: Arc<dyn SignalNode<A>>,
    right: Arc<dyn SignalNode<B>>,
    combine: Arc<dyn Fn(&A, &B) -> C + Send + Sync>,
    left_edge: Arc<Edge<A>>,
    right_edge: Arc<Edge<B>>,
}

impl<A, B, C> CombineSignalNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub(crate) fn create<F>(
        left: Arc<dyn SignalNode<A>>,
        right: Arc<dyn SignalNode<B>>,
        combine: F,
    ) -> Arc<Self>
    where
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        let rank = left.core().rank().max(right.core().rank()) + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            // Parent updates only mark the node pending; the values are
            // read from the parents' memories at fire time, after both
            // have settled.
            let left_weak = weak.clone();
            let left_edge = Edge::new(move |_: &TryValue<A>, txn: &mut Transaction| {
                if let Some(node) = left_weak.upgrade() {
                    txn.enqueue(node);
                }
            });
            let right_weak = weak.clone();
            let right_edge = Edge::new(move |_: &TryValue<B>, txn: &mut Transaction| {
                if let Some(node) = right_weak.upgrade() {
                    txn.enqueue(node);
                }
            });

            Self {
                core: NodeCore::new(rank),
                memory: SignalMemory::new(),
                left,
                right,
                combine: Arc::new(combine),
                left_edge,
                right_edge,
            }
        })
    }
}

impl<A, B, C> ObservableNode<C> for CombineSignalNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<C> {
        &self.core
    }

    fn on_start(&self) {
        self.left.add_internal_observer(Arc::clone(&self.left_edge));
        self.right
            .add_internal_observer(Arc::clone(&self.right_edge));
        // Both parents are started now; read them synchronously for the
        // initial value.
        self.memory.ensure(|| self.current());
    }

    fn on_stop(&self) {
        self.left.remove_internal_observer(self.left_edge.id());
        self.right.remove_internal_observer(self.right_edge.id());
    }
}

impl<A, B, C> SignalNode<C> for CombineSignalNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn memory(&self) -> &SignalMemory<C> {
        &self.memory
    }

    fn current(&self) -> TryValue<C> {
        combined(
            &self.left.try_now(),
            &self.right.try_now(),
            self.combine.as_ref(),
        )
    }
}

impl<A, B, C> PendingObservable for CombineSignalNode<A, B, C>
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
        let out = self.current();
        self.fire_signal(out, txn);
    }
}

/// A stream node combining the latest values of two parent streams.
pub(crate) struct CombineStreamNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    core: NodeCore<C>,
    left: Arc<dyn ObservableNode<A>>,
    right: Arc<dyn ObservableNode<B>>,
    combine: Arc<dyn Fn(&A, &B) -> C + Send + Sync>,
    left_edge: Arc<Edge<A>>,
    right_edge: Arc<Edge<B>>,

    /// Latest observed value per parent; `None` until the parent has fired
    /// at least once since the node started.
    slots: RwLock<(Option<TryValue<A>>, Option<TryValue<B>>)>,
}

impl<A, B, C> CombineStreamNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub(crate) fn create<F>(
        left: Arc<dyn ObservableNode<A>>,
        right: Arc<dyn ObservableNode<B>>,
        combine: F,
    ) -> Arc<Self>
    where
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        let rank = left.core().rank().max(right.core().rank()) + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let left_weak = weak.clone();
            let left_edge = Edge::new(move |value: &TryValue<A>, txn: &mut Transaction| {
                let Some(node) = left_weak.upgrade() else { return };
                node.slots.write().expect("combine slots lock poisoned").0 =
                    Some(value.clone());
                txn.enqueue(node);
            });
            let right_weak = weak.clone();
            let right_edge = Edge::new(move |value: &TryValue<B>, txn: &mut Transaction| {
                let Some(node) = right_weak.upgrade() else { return };
                node.slots.write().expect("combine slots lock poisoned").1 =
                    Some(value.clone());
                txn.enqueue(node);
            });

            Self {
                core: NodeCore::new(rank),
                left,
                right,
                combine: Arc::new(combine),
                left_edge,
                right_edge,
                slots: RwLock::new((None, None)),
            }
        })
    }
}

impl<A, B, C> ObservableNode<C> for CombineStreamNode<A, B, C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<C> {
        &self.core
    }

    fn on_start(&self) {
        self.left.add_internal_observer(Arc::clone(&self.left_edge));
        self.right
            .add_internal_observer(Arc::clone(&self.right_edge));
    }

    fn on_stop(&self) {
        self.left.remove_internal_observer(self.left_edge.id());
        self.right.remove_internal_observer(self.right_edge.id());
        *self.slots.write().expect("combine slots lock poisoned") = (None, None);
    }
}

impl<A, B, C> PendingObservable for CombineStreamNode<A, B, C>
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
        let out = {
            let slots = self.slots.read().expect("combine slots lock poisoned");
            match (&slots.0, &slots.1) {
                (Some(left), Some(right)) => {
                    Some(combined(left, right, self.combine.as_ref()))
                }
                // Not every parent has produced a value yet.
                _ => None,
            }
        };
        if let Some(out) = out {
            self.core.fire(&out, txn);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use crate::error::ObservableError;
    use crate::sources::event_bus::EventBus;
    use crate::sources::var::Var;

    #[test]
    fn signal_combine_computes_initial_value_from_parents() {
        let a = Var::new(2);
        let b = Var::new(3);
        let sum = a.signal().combine_with(&b.signal(), |x, y| x + y);

        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = sum.subscribe_fn(move |v| {
            seen_clone.write().expect("seen lock poisoned").push(*v);
        });

        // Replay of the initial value on subscribe.
        assert_eq!(*seen.read().expect("seen lock poisoned"), vec![5]);

        a.set(10);
        assert_eq!(*seen.read().expect("seen lock poisoned"), vec![5, 13]);
    }

    #[test]
    fn signal_combine_short_circuits_errors_left_first() {
        let a: Var<i32> = Var::new(1);
        let b: Var<i32> = Var::new(2);
        let sum = a.signal().combine_with(&b.signal(), |x, y| x + y);

        let errors = Arc::new(RwLock::new(Vec::new()));
        let errors_clone = errors.clone();
        let _sub = sum.subscribe(crate::observable::observer::Observer::with_error(
            |_| {},
            move |e| {
                errors_clone
                    .write()
                    .expect("errors lock poisoned")
                    .push(e.clone());
            },
        ));

        a.set_error(ObservableError::Source("left".into()));
        b.set_error(ObservableError::Source("right".into()));

        let errors = errors.read().expect("errors lock poisoned");
        assert_eq!(errors.len(), 2);
        // Once both are failed, the left parent's error wins.
        assert_eq!(errors[1], ObservableError::Source("left".into()));
    }

    #[test]
    fn stream_combine_waits_for_both_parents() {
        let left: EventBus<i32> = EventBus::new();
        let right: EventBus<i32> = EventBus::new();
        let pairs = left
            .events()
            .combine_with(&right.events(), |a, b| (*a, *b));

        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = pairs.subscribe_fn(move |v| {
            seen_clone.write().expect("seen lock poisoned").push(*v);
        });

        left.emit(1);
        assert!(seen.read().expect("seen lock poisoned").is_empty());

        right.emit(10);
        left.emit(2);
        assert_eq!(
            *seen.read().expect("seen lock poisoned"),
            vec![(1, 10), (2, 10)]
        );
    }

    #[test]
    fn stream_combine_clears_slots_across_stops() {
        let left: EventBus<i32> = EventBus::new();
        let right: EventBus<i32> = EventBus::new();
        let pairs = left
            .events()
            .combine_with(&right.events(), |a, b| (*a, *b));

        let seen = Arc::new(RwLock::new(Vec::new()));
        let seen_clone = seen.clone();
        let sub = pairs.subscribe_fn(move |v| {
            seen_clone.write().expect("seen lock poisoned").push(*v);
        });

        left.emit(1);
        sub.kill();

        // Restart: the left slot was cleared, so the node waits again.
        let seen_clone = seen.clone();
        let _sub = pairs.subscribe_fn(move |v| {
            seen_clone.write().expect("seen lock poisoned").push(*v);
        });
        right.emit(10);
        assert!(seen.read().expect("seen lock poisoned").is_empty());

        left.emit(2);
        assert_eq!(*seen.read().expect("seen lock poisoned"), vec![(2, 10)]);
    }
}
