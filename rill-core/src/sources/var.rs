//! Var
//!
//! A programmatic signal source: a `Var` owns a current try-value from the
//! moment it is created. Updates fire in a transaction of their own, so an
//! update made from inside an observer callback is deferred until the
//! current transaction drains. The current value is readable at any time,
//! observed or not.

use std::sync::Arc;

use crate::engine::runtime;
use crate::engine::transaction::Transaction;
use crate::error::{ObservableError, TryValue};
use crate::observable::node::{NodeCore, ObservableNode, SignalMemory, SignalNode};
use crate::observable::signal::Signal;

struct VarNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    core: NodeCore<A>,
    memory: SignalMemory<A>,
}

impl<A> ObservableNode<A> for VarNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore<A> {
        &self.core
    }

    fn on_start(&self) {}

    fn on_stop(&self) {}
}

impl<A> SignalNode<A> for VarNode<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn memory(&self) -> &SignalMemory<A> {
        &self.memory
    }

    fn current(&self) -> TryValue<A> {
        self.memory
            .latched()
            .expect("var memory is set at construction")
    }
}

/// A source signal with a settable current value.
pub struct Var<A>
where
    A: Clone + Send + Sync + 'static,
{
    node: Arc<VarNode<A>>,
}

impl<A> Var<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Create a var holding `initial`.
    pub fn new(initial: A) -> Self {
        Self {
            node: Arc::new(VarNode {
                core: NodeCore::new(1),
                memory: SignalMemory::with_value(Ok(initial)),
            }),
        }
    }

    /// The signal view of this var.
    pub fn signal(&self) -> Signal<A> {
        Signal {
            node: Arc::clone(&self.node) as Arc<dyn SignalNode<A>>,
        }
    }

    /// Read the current value synchronously.
    pub fn try_now(&self) -> TryValue<A> {
        self.node.try_now()
    }

    /// Set a new value, firing a transaction.
    pub fn set(&self, value: A) {
        self.fire(Ok(value));
    }

    /// Latch an error as the current value, firing a transaction.
    pub fn set_error(&self, error: ObservableError) {
        self.fire(Err(error));
    }

    /// Update the current value with a closure.
    ///
    /// When an error is latched there is no value to update: the update is
    /// skipped and the error re-reported to the unhandled-error sink.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(&A) -> A,
    {
        match self.try_now() {
            Ok(value) => self.set(update(&value)),
            Err(error) => runtime::report_unhandled(&error),
        }
    }

    fn fire(&self, value: TryValue<A>) {
        let node = Arc::clone(&self.node);
        Transaction::run(move |txn| {
            // Latch-and-notify even when unobserved: the current value must
            // reflect the most recent firing at all times.
            node.fire_signal(value, txn);
        });
    }
}

impl<A> Clone for Var<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}
