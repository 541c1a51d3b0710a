//! Engine Runtime
//!
//! The runtime owns the only process-wide state the engine has: the queue
//! of transactions waiting to run, and the unhandled-error sink. Both live
//! in a per-thread cell — the engine assumes single-threaded cooperative
//! execution, so one engine instance exists per host thread, initialized
//! lazily on first use and torn down with the thread.
//!
//! # Transaction Queueing
//!
//! Exactly one transaction is current at any time. A transaction created
//! while another is in flight does not run re-entrantly; it is pushed onto
//! the pending queue and runs, in FIFO order, once the current transaction
//! drains. See [`Transaction::run`](super::transaction::Transaction::run)
//! for the loop that consumes this queue.
//!
//! # Unhandled Errors
//!
//! An error emission delivered to an observer that has no error handler has
//! nowhere to go; the engine reports it here, once per such observer.
//! Lifecycle-hook failures are also reported here, since propagating them
//! downstream would be semantically wrong. Registered handlers are invoked
//! in registration order; when none are registered the engine logs the
//! error instead.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ObservableError;

use super::transaction::Transaction;

/// A queued transaction body, waiting for the current transaction to drain.
pub(crate) type TransactionBody = Box<dyn FnOnce(&mut Transaction)>;

/// Unique identifier for a registered unhandled-error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HandlerId(u64);

impl HandlerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-thread engine state.
struct EngineState {
    /// Whether a transaction is currently draining on this thread.
    transaction_active: bool,

    /// Transactions waiting for the current one to complete, FIFO.
    queued: VecDeque<TransactionBody>,

    /// The unhandled-error sink of last resort.
    handlers: Vec<(HandlerId, Rc<dyn Fn(&ObservableError)>)>,
}

thread_local! {
    static ENGINE: RefCell<EngineState> = RefCell::new(EngineState {
        transaction_active: false,
        queued: VecDeque::new(),
        handlers: Vec::new(),
    });
}

/// Try to make the calling transaction current.
///
/// Returns the body back when the engine was idle (the caller now owns the
/// drain loop). When a transaction is already in flight the body is queued
/// and `None` is returned.
pub(crate) fn try_begin(body: TransactionBody) -> Option<TransactionBody> {
    ENGINE.with(|engine| {
        let mut state = engine.borrow_mut();
        if state.transaction_active {
            state.queued.push_back(body);
            None
        } else {
            state.transaction_active = true;
            Some(body)
        }
    })
}

/// Pop the next queued transaction, or release the engine if none remain.
pub(crate) fn finish_or_next() -> Option<TransactionBody> {
    ENGINE.with(|engine| {
        let mut state = engine.borrow_mut();
        match state.queued.pop_front() {
            Some(body) => Some(body),
            None => {
                state.transaction_active = false;
                None
            }
        }
    })
}

/// Report an error that no observer handled.
///
/// Handlers are cloned out of the engine cell before invocation so a
/// handler may itself register handlers or open transactions without
/// re-entering the cell.
pub(crate) fn report_unhandled(error: &ObservableError) {
    let handlers: Vec<Rc<dyn Fn(&ObservableError)>> = ENGINE.with(|engine| {
        engine
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect()
    });

    if handlers.is_empty() {
        tracing::error!(%error, "unhandled observable error");
        return;
    }

    for handler in handlers {
        handler(error);
    }
}

/// Handle to a registered unhandled-error handler.
///
/// Dropping this handle unregisters the handler.
pub struct UnhandledErrorHandle {
    id: HandlerId,
}

impl Drop for UnhandledErrorHandle {
    fn drop(&mut self) {
        let id = self.id;
        ENGINE.with(|engine| {
            engine
                .borrow_mut()
                .handlers
                .retain(|(handler_id, _)| *handler_id != id);
        });
    }
}

/// Register a handler with the unhandled-error sink.
///
/// Handlers run on the engine thread, during the firing that produced the
/// error. They must not panic.
pub fn on_unhandled_error<F>(handler: F) -> UnhandledErrorHandle
where
    F: Fn(&ObservableError) + 'static,
{
    let id = HandlerId::new();
    ENGINE.with(|engine| {
        engine
            .borrow_mut()
            .handlers
            .push((id, Rc::new(handler)));
    });
    UnhandledErrorHandle { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handler_receives_unhandled_errors() {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();

        let _handle = on_unhandled_error(move |_| {
            count_clone.set(count_clone.get() + 1);
        });

        report_unhandled(&ObservableError::ConnectionClosed);
        assert_eq!(count.get(), 1);

        report_unhandled(&ObservableError::ConnectionClosed);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn dropping_the_handle_unregisters() {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();

        let handle = on_unhandled_error(move |_| {
            count_clone.set(count_clone.get() + 1);
        });

        report_unhandled(&ObservableError::ConnectionClosed);
        assert_eq!(count.get(), 1);

        drop(handle);
        report_unhandled(&ObservableError::ConnectionClosed);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_a = order.clone();
        let _a = on_unhandled_error(move |_| order_a.borrow_mut().push("a"));
        let order_b = order.clone();
        let _b = on_unhandled_error(move |_| order_b.borrow_mut().push("b"));

        report_unhandled(&ObservableError::ConnectionClosed);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn queueing_respects_fifo_order() {
        // Acquire the engine, queue two bodies, then release and verify
        // they come back in submission order.
        let owned = try_begin(Box::new(|_| {}));
        assert!(owned.is_some());

        assert!(try_begin(Box::new(|_| {})).is_none());
        assert!(try_begin(Box::new(|_| {})).is_none());

        assert!(finish_or_next().is_some());
        assert!(finish_or_next().is_some());
        assert!(finish_or_next().is_none());

        // Engine is idle again.
        let owned = try_begin(Box::new(|_| {}));
        assert!(owned.is_some());
        assert!(finish_or_next().is_none());
    }
}
