//! Debug Lifecycle Passthrough
//!
//! Identity operators that surface a node's lifecycle: hooks run on start,
//! on stop, and (for signals) when the initial value is first computed.
//! Hook failures are routed to the unhandled-error sink — propagating them
//! downstream would corrupt the value channel with errors the graph never
//! produced.

use std::sync::{Arc, Weak};

use crate::engine::runtime;
use crate::error::{ObservableError, TryValue};
use crate::observable::node::{Edge, NodeCore, ObservableNode, SignalMemory, SignalNode};

type HookFn = Box<dyn Fn() -> Result<(), ObservableError> + Send + Sync>;
type InitialHookFn<A> =
    Box<dyn Fn(&TryValue<A>) -> Result<(), ObservableError> + Send + Sync>;

/// Lifecycle hooks for a debug passthrough.
///
/// Every hook is optional. `on_initial` only fires on signals, when the
/// initial value is first computed.
pub struct LifecycleHooks<A> {
    pub(crate) on_start: Option<HookFn>,
    pub(crate) on_stop: Option<HookFn>,
    pub(crate) on_initial: Option<InitialHookFn<A>>,
}

impl<A> LifecycleHooks<A> {
    pub fn new() -> Self {
        Self {
            on_start: None,
            on_stop: None,
            on_initial: None,
        }
    }

    /// Run `hook` when the node starts.
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), ObservableError> + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Run `hook` when the node stops.
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), ObservableError> + Send + Sync + 'static,
    {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// Run `hook` with the initial value when it is first computed
    /// (signals only).
    pub fn on_initial<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TryValue<A>) -> Result<(), ObservableError> + Send + Sync + 'static,
    {
        self.on_initial = Some(Box::new(hook));
        self
    }
}

impl<A> Default for LifecycleHooks<A> {
    fn default() -> Self {
        Self::new()
    }
}

fn run_hook(hook: &Option<HookFn>) {
    if let Some(hook) = hook {
        if let Err(error) = hook() {
            runtime::report_unhandled(&error);
        }
    }
}

/// An identity stream node with lifecycle hooks.
pub(crate) struct DebugStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    core: NodeCore<A>,
    parent: Arc<dyn ObservableNode<A>>,
    edge: Arc<Edge<A>>,
    hooks: LifecycleHooks<A>,
}

impl<A> DebugStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn create(
        parent: Arc<dyn ObservableNode<A>>,
        hooks: LifecycleHooks<A>,
    ) -> Arc<Self> {
        let rank = parent.core().rank() + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let edge = Edge::new(move |value: &TryValue<A>, txn| {
                if let Some(node) = weak.upgrade() {
                    node.core.fire(value, txn);
                }
            });
            Self {
                core: NodeCore::new(rank),
                parent,
                edge,
                hooks,
            }
        })
    }
}

impl<A> ObservableNode<A> for DebugStreamNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {
        run_hook(&self.hooks.on_start);
        self.parent.add_internal_observer(Arc::clone(&self.edge));
    }

    fn on_stop(&self) {
        self.parent.remove_internal_observer(self.edge.id());
        run_hook(&self.hooks.on_stop);
    }
}

/// An identity signal node with lifecycle hooks.
pub(crate) struct DebugSignalNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    core: NodeCore<A>,
    memory: SignalMemory<A>,
    parent: Arc<dyn SignalNode<A>>,
    edge: Arc<Edge<A>>,
    hooks: LifecycleHooks<A>,
}

impl<A> DebugSignalNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn create(
        parent: Arc<dyn SignalNode<A>>,
        hooks: LifecycleHooks<A>,
    ) -> Arc<Self> {
        let rank = parent.core().rank() + 1;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let edge = Edge::new(move |value: &TryValue<A>, txn| {
                if let Some(node) = weak.upgrade() {
                    node.fire_signal(value.clone(), txn);
                }
            });
            Self {
                core: NodeCore::new(rank),
                memory: SignalMemory::new(),
                parent,
                edge,
                hooks,
            }
        })
    }
}

impl<A> ObservableNode<A> for DebugSignalNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {
        run_hook(&self.hooks.on_start);
        self.parent.add_internal_observer(Arc::clone(&self.edge));
        if let Some(initial) = self.memory.ensure(|| self.parent.try_now()) {
            if let Some(hook) = &self.hooks.on_initial {
                if let Err(error) = hook(&initial) {
                    runtime::report_unhandled(&error);
                }
            }
        }
    }

    fn on_stop(&self) {
        self.parent.remove_internal_observer(self.edge.id());
        run_hook(&self.hooks.on_stop);
    }
}

impl<A> SignalNode<A> for DebugSignalNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn memory(&self) -> &SignalMemory<A> {
        &self.memory
    }

    fn current(&self) -> TryValue<A> {
        self.parent.try_now()
    }
}
