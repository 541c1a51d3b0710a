//! Observers and Subscriptions
//!
//! An [`Observer`] is the pair of callbacks a user attaches to an
//! observable: `on_next` for values, and optionally `on_error` for
//! failures. An observer without an error handler causes each error
//! emission it receives to be reported to the unhandled-error sink.
//!
//! Subscribing returns a [`Subscription`] handle. Killing it (explicitly,
//! or by dropping it) detaches the observer and, if that was the node's
//! last observer, stops the node and recursively releases its parents.

use std::sync::Arc;

use crate::engine::runtime;
use crate::error::{ObservableError, TryValue};

use super::node::SubscriptionId;

type NextFn<A> = Box<dyn Fn(&A) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&ObservableError) + Send + Sync>;

/// A user callback pair attached to an observable.
pub struct Observer<A> {
    on_next: NextFn<A>,
    on_error: Option<ErrorFn>,
}

impl<A> Observer<A> {
    /// Create an observer with a value callback only.
    ///
    /// Error emissions delivered to this observer are reported to the
    /// unhandled-error sink.
    pub fn new<F>(on_next: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        Self {
            on_next: Box::new(on_next),
            on_error: None,
        }
    }

    /// Create an observer with both value and error callbacks.
    pub fn with_error<F, E>(on_next: F, on_error: E) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
        E: Fn(&ObservableError) + Send + Sync + 'static,
    {
        Self {
            on_next: Box::new(on_next),
            on_error: Some(Box::new(on_error)),
        }
    }
}

/// An observer registered with a node, keyed for removal.
pub(crate) struct ObserverEntry<A> {
    id: SubscriptionId,
    observer: Observer<A>,
}

impl<A> ObserverEntry<A> {
    pub(crate) fn new(observer: Observer<A>) -> Self {
        Self {
            id: SubscriptionId::new(),
            observer,
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Deliver one emission to this observer.
    ///
    /// Errors go to the observer's error handler when it has one, and to
    /// the unhandled-error sink when it does not.
    pub(crate) fn notify(&self, value: &TryValue<A>) {
        match value {
            Ok(v) => (self.observer.on_next)(v),
            Err(e) => match &self.observer.on_error {
                Some(handler) => handler(e),
                None => runtime::report_unhandled(e),
            },
        }
    }
}

/// Handle to an attached observer.
///
/// Killing the subscription removes the observer; if that was the node's
/// last observer the node stops, recursively releasing its parents.
/// Dropping the handle kills it. A kill during a notification batch lets
/// the remaining callbacks of that batch run, but suppresses all later
/// notifications.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach the observer. Synchronous; consuming the handle makes a
    /// second kill impossible.
    pub fn kill(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Build the subscription handle for an observer attached to `node`.
pub(crate) fn subscription_for<A, N>(node: Arc<N>, id: SubscriptionId) -> Subscription
where
    A: Clone + Send + Sync + 'static,
    N: super::node::ObservableNode<A> + ?Sized + 'static,
{
    Subscription::new(move || node.remove_external_observer(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn observer_routes_values_and_errors() {
        let values = Arc::new(AtomicI32::new(0));
        let errors = Arc::new(AtomicI32::new(0));

        let values_clone = values.clone();
        let errors_clone = errors.clone();
        let entry = ObserverEntry::new(Observer::with_error(
            move |v: &i32| {
                values_clone.store(*v, Ordering::SeqCst);
            },
            move |_| {
                errors_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));

        entry.notify(&Ok(42));
        assert_eq!(values.load(Ordering::SeqCst), 42);
        assert_eq!(errors.load(Ordering::SeqCst), 0);

        entry.notify(&Err(ObservableError::ConnectionClosed));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_kill_runs_detach_once() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        let sub = Subscription::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sub.kill();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_a_subscription_detaches() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        {
            let _sub = Subscription::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
