//! Graph Nodes
//!
//! This module defines the state every observable node carries and the
//! traits the rest of the engine dispatches through.
//!
//! # Anatomy of a Node
//!
//! Each node owns a [`NodeCore`]: a constant topological rank, an ordered
//! list of external observers (user callbacks) and an ordered list of
//! internal edges (deliveries to downstream nodes). A node also holds
//! strong references to its parents, while parents reach children only
//! through edges holding weak references — so the graph has no ownership
//! cycles and a chain of observables is kept alive exactly by whoever
//! observes its tail.
//!
//! # Lifecycle
//!
//! A node is dormant until its total observer count (external + internal)
//! goes from zero to one. At that point `on_start` runs, subscribing the
//! node to its parents (recursively starting them) and, for signals,
//! computing the initial value. When the count drops back to zero,
//! `on_stop` runs and releases the parents. The count transitions and the
//! hooks are paired: starts and stops always alternate.
//!
//! # Notification
//!
//! Firing snapshots both observer lists before iterating, so a
//! subscription killed during a notification batch still receives the rest
//! of that batch but nothing afterwards, and callbacks may freely
//! subscribe or unsubscribe mid-firing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::engine::transaction::{Transaction, TransactionId};
use crate::error::TryValue;

use super::observer::ObserverEntry;

/// Unique identifier for a node in the observable graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for an internal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EdgeId(u64);

impl EdgeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identifier for an external subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A delivery edge from a parent node to a downstream node.
///
/// The closure captures a weak reference to the downstream node together
/// with whatever per-operator work the delivery entails (project and fire,
/// stash and enqueue, or nothing at all for keep-alive edges).
pub(crate) struct Edge<A> {
    id: EdgeId,
    deliver: Box<dyn Fn(&TryValue<A>, &mut Transaction) + Send + Sync>,
}

impl<A> Edge<A> {
    /// Create an edge with the given delivery closure.
    pub(crate) fn new<F>(deliver: F) -> Arc<Self>
    where
        F: Fn(&TryValue<A>, &mut Transaction) + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: EdgeId::new(),
            deliver: Box::new(deliver),
        })
    }

    /// Create an edge that delivers nothing.
    ///
    /// Used to keep a sampled signal started without reacting to its
    /// updates.
    pub(crate) fn inert() -> Arc<Self> {
        Self::new(|_, _| {})
    }

    pub(crate) fn id(&self) -> EdgeId {
        self.id
    }

    pub(crate) fn deliver(&self, value: &TryValue<A>, txn: &mut Transaction) {
        (self.deliver)(value, txn);
    }
}

/// The observer bookkeeping of a node.
struct Observers<A> {
    external: Vec<Arc<ObserverEntry<A>>>,
    internal: Vec<Arc<Edge<A>>>,
    started: bool,
}

impl<A> Observers<A> {
    fn total(&self) -> usize {
        self.external.len() + self.internal.len()
    }
}

/// Common state shared by every observable node.
pub(crate) struct NodeCore<A> {
    id: NodeId,

    /// Topological rank: constant, strictly greater than every parent's.
    rank: u32,

    observers: RwLock<Observers<A>>,

    /// The transaction this node last fired in; a node fires at most once
    /// per transaction.
    last_fired: RwLock<Option<TransactionId>>,
}

impl<A: Clone + Send + Sync + 'static> NodeCore<A> {
    /// Create the core for a node with the given rank.
    pub(crate) fn new(rank: u32) -> Self {
        Self {
            id: NodeId::new(),
            rank,
            observers: RwLock::new(Observers {
                external: Vec::new(),
                internal: Vec::new(),
                started: false,
            }),
            last_fired: RwLock::new(None),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn rank(&self) -> u32 {
        self.rank
    }

    pub(crate) fn is_started(&self) -> bool {
        self.observers
            .read()
            .expect("observers lock poisoned")
            .started
    }

    /// Add an external observer. Returns true on the 0 -> 1 transition.
    pub(crate) fn add_external(&self, entry: Arc<ObserverEntry<A>>) -> bool {
        let mut observers = self.observers.write().expect("observers lock poisoned");
        observers.external.push(entry);
        let becomes_started = !observers.started && observers.total() == 1;
        if becomes_started {
            observers.started = true;
        }
        becomes_started
    }

    /// Remove an external observer. Returns true on the 1 -> 0 transition.
    pub(crate) fn remove_external(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().expect("observers lock poisoned");
        observers.external.retain(|entry| entry.id() != id);
        let becomes_stopped = observers.started && observers.total() == 0;
        if becomes_stopped {
            observers.started = false;
        }
        becomes_stopped
    }

    /// Add an internal edge. Returns true on the 0 -> 1 transition.
    pub(crate) fn add_internal(&self, edge: Arc<Edge<A>>) -> bool {
        let mut observers = self.observers.write().expect("observers lock poisoned");
        observers.internal.push(edge);
        let becomes_started = !observers.started && observers.total() == 1;
        if becomes_started {
            observers.started = true;
        }
        becomes_started
    }

    /// Remove an internal edge. Returns true on the 1 -> 0 transition.
    pub(crate) fn remove_internal(&self, id: EdgeId) -> bool {
        let mut observers = self.observers.write().expect("observers lock poisoned");
        observers.internal.retain(|edge| edge.id() != id);
        let becomes_stopped = observers.started && observers.total() == 0;
        if becomes_stopped {
            observers.started = false;
        }
        becomes_stopped
    }

    /// Fire a value from this node within a transaction.
    ///
    /// External observers are notified first, in subscription order, then
    /// internal edges deliver downstream in subscription order. Both lists
    /// are snapshotted before iteration.
    pub(crate) fn fire(&self, value: &TryValue<A>, txn: &mut Transaction) {
        {
            let mut last = self.last_fired.write().expect("last_fired lock poisoned");
            debug_assert!(
                *last != Some(txn.id()),
                "observable {:?} fired twice in transaction {:?}",
                self.id,
                txn.id()
            );
            *last = Some(txn.id());
        }

        let (externals, internals) = {
            let observers = self.observers.read().expect("observers lock poisoned");
            (observers.external.clone(), observers.internal.clone())
        };

        for entry in &externals {
            entry.notify(value);
        }
        for edge in &internals {
            edge.deliver(value, txn);
        }
    }
}

/// The behavior every observable node implements.
///
/// `on_start` and `on_stop` are the only operator-specific pieces; observer
/// bookkeeping and the start/stop transitions are provided.
pub(crate) trait ObservableNode<A: Clone + Send + Sync + 'static>: Send + Sync {
    /// The node's common state.
    fn core(&self) -> &NodeCore<A>;

    /// Runs on the 0 -> 1 observer transition. Subscribes to parents and,
    /// for signals, computes the initial value.
    fn on_start(&self);

    /// Runs on the 1 -> 0 observer transition. Releases parents and clears
    /// any transient per-transaction state.
    fn on_stop(&self);

    fn add_external_observer(&self, entry: Arc<ObserverEntry<A>>) {
        if self.core().add_external(entry) {
            tracing::debug!(node = self.core().id().raw(), "observable started");
            self.on_start();
        }
    }

    fn remove_external_observer(&self, id: SubscriptionId) {
        if self.core().remove_external(id) {
            tracing::debug!(node = self.core().id().raw(), "observable stopped");
            self.on_stop();
        }
    }

    fn add_internal_observer(&self, edge: Arc<Edge<A>>) {
        if self.core().add_internal(edge) {
            tracing::debug!(node = self.core().id().raw(), "observable started");
            self.on_start();
        }
    }

    fn remove_internal_observer(&self, id: EdgeId) {
        if self.core().remove_internal(id) {
            tracing::debug!(node = self.core().id().raw(), "observable stopped");
            self.on_stop();
        }
    }
}

/// The latched current value of a signal node.
pub(crate) struct SignalMemory<A> {
    value: RwLock<Option<TryValue<A>>>,
}

impl<A: Clone> SignalMemory<A> {
    /// Create empty memory; the initial value is computed on first start.
    pub(crate) fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// Create memory pre-latched with a value (source signals).
    pub(crate) fn with_value(value: TryValue<A>) -> Self {
        Self {
            value: RwLock::new(Some(value)),
        }
    }

    /// The latched value, if any.
    pub(crate) fn latched(&self) -> Option<TryValue<A>> {
        self.value.read().expect("memory lock poisoned").clone()
    }

    /// Latch a new current value.
    pub(crate) fn latch(&self, value: TryValue<A>) {
        *self.value.write().expect("memory lock poisoned") = Some(value);
    }

    /// Latch the result of `compute` unless a value is already present.
    ///
    /// Returns the freshly computed value when one was latched, `None` when
    /// the memory already held one (stop/restart preserves the old value).
    pub(crate) fn ensure<F>(&self, compute: F) -> Option<TryValue<A>>
    where
        F: FnOnce() -> TryValue<A>,
    {
        let mut value = self.value.write().expect("memory lock poisoned");
        if value.is_some() {
            return None;
        }
        let fresh = compute();
        *value = Some(fresh.clone());
        Some(fresh)
    }
}

/// The behavior signal nodes add on top of [`ObservableNode`]: a latched
/// current value with synchronous reads.
pub(crate) trait SignalNode<A: Clone + Send + Sync + 'static>: ObservableNode<A> {
    /// The node's latched value store.
    fn memory(&self) -> &SignalMemory<A>;

    /// Compute the value fresh from the parents, without latching.
    fn current(&self) -> TryValue<A>;

    /// Read the current value synchronously.
    ///
    /// Returns the latched value when one exists; a signal that has never
    /// started computes on demand.
    fn try_now(&self) -> TryValue<A> {
        match self.memory().latched() {
            Some(value) => value,
            None => self.current(),
        }
    }

    /// Latch `value` as current, then notify observers.
    fn fire_signal(&self, value: TryValue<A>, txn: &mut Transaction) {
        self.memory().latch(value.clone());
        self.core().fire(&value, txn);
    }
}
