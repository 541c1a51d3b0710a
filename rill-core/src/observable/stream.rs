//! Event Streams
//!
//! The discrete observable variant and its combinators. An `EventStream`
//! is a cheap cloneable handle to a graph node; combinators build new
//! nodes ranked one above their parents and return handles to them.
//! Nothing runs until the stream (or a descendant) is observed.

use std::sync::{Arc, RwLock};

use crate::error::{ObservableError, TryValue};
use crate::operators::combine::CombineStreamNode;
use crate::operators::debug::{DebugStreamNode, LifecycleHooks};
use crate::operators::fold::FoldSignalNode;
use crate::operators::merge::MergeStreamNode;
use crate::operators::project::ProjectStreamNode;
use crate::operators::sample::SampleCombineNode;

use super::node::ObservableNode;
use super::observer::{subscription_for, Observer, ObserverEntry, Subscription};
use super::signal::Signal;

/// A discrete observable: a sequence of try-values over time, with no
/// current value.
pub struct EventStream<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) node: Arc<dyn ObservableNode<A>>,
}

impl<A> EventStream<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Attach an observer. Starts the stream if it was dormant.
    pub fn subscribe(&self, observer: Observer<A>) -> Subscription {
        let entry = Arc::new(ObserverEntry::new(observer));
        let id = entry.id();
        self.node.add_external_observer(entry);
        subscription_for(Arc::clone(&self.node), id)
    }

    /// Attach a value-only observer.
    ///
    /// Error emissions reaching this observer are reported to the
    /// unhandled-error sink.
    pub fn subscribe_fn<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe(Observer::new(on_next))
    }

    /// Apply a pure projection to every value. Errors pass through.
    pub fn map<B, F>(&self, project: F) -> EventStream<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            Some(match value {
                Ok(v) => Ok(project(v)),
                Err(e) => Err(e.clone()),
            })
        });
        EventStream { node }
    }

    /// Apply a fallible projection; an `Err` result is emitted as an error.
    pub fn map_result<B, F>(&self, project: F) -> EventStream<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&A) -> TryValue<B> + Send + Sync + 'static,
    {
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            Some(match value {
                Ok(v) => project(v),
                Err(e) => Err(e.clone()),
            })
        });
        EventStream { node }
    }

    /// Drop values failing the predicate. Errors always pass.
    pub fn filter<F>(&self, predicate: F) -> EventStream<A>
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            match value {
                Ok(v) if predicate(v) => Some(Ok(v.clone())),
                Ok(_) => None,
                Err(e) => Some(Err(e.clone())),
            }
        });
        EventStream { node }
    }

    /// Project and filter in one pass: `None` drops the value.
    pub fn collect<B, F>(&self, project: F) -> EventStream<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&A) -> Option<B> + Send + Sync + 'static,
    {
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            match value {
                Ok(v) => project(v).map(Ok),
                Err(e) => Some(Err(e.clone())),
            }
        });
        EventStream { node }
    }

    /// Drop consecutive duplicate values. Errors always pass and do not
    /// disturb the comparison state.
    pub fn distinct(&self) -> EventStream<A>
    where
        A: PartialEq,
    {
        let last: RwLock<Option<A>> = RwLock::new(None);
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            match value {
                Ok(v) => {
                    let mut last = last.write().expect("distinct state lock poisoned");
                    if last.as_ref() == Some(v) {
                        None
                    } else {
                        *last = Some(v.clone());
                        Some(Ok(v.clone()))
                    }
                }
                Err(e) => Some(Err(e.clone())),
            }
        });
        EventStream { node }
    }

    /// Map errors back into the value channel: `Some(value)` re-emits a
    /// success, `None` swallows the error. Values pass through untouched.
    pub fn recover<F>(&self, heal: F) -> EventStream<A>
    where
        F: Fn(&ObservableError) -> Option<A> + Send + Sync + 'static,
    {
        let node = ProjectStreamNode::create(Arc::clone(&self.node), move |value| {
            match value {
                Ok(v) => Some(Ok(v.clone())),
                Err(e) => heal(e).map(Ok),
            }
        });
        EventStream { node }
    }

    /// Merge any number of same-typed streams into one.
    pub fn merge(streams: &[EventStream<A>]) -> EventStream<A> {
        let parents = streams.iter().map(|s| Arc::clone(&s.node)).collect();
        EventStream {
            node: MergeStreamNode::create(parents),
        }
    }

    /// Merge this stream with one other.
    pub fn merge_with(&self, other: &EventStream<A>) -> EventStream<A> {
        Self::merge(&[self.clone(), other.clone()])
    }

    /// Combine the latest values of two streams. Silent until both parents
    /// have fired at least once; fires at most once per transaction.
    pub fn combine_with<B, C, F>(&self, other: &EventStream<B>, combine: F) -> EventStream<C>
    where
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        EventStream {
            node: CombineStreamNode::create(
                Arc::clone(&self.node),
                Arc::clone(&other.node),
                combine,
            ),
        }
    }

    /// Fold this stream into a signal from a seed; the signal's current
    /// value is the accumulator.
    pub fn fold<B, F>(&self, seed: B, step: F) -> Signal<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&B, &A) -> B + Send + Sync + 'static,
    {
        Signal {
            node: FoldSignalNode::create(Arc::clone(&self.node), seed, step),
        }
    }

    /// Turn this stream into a signal that starts at `initial` and then
    /// follows the stream.
    pub fn start_with(&self, initial: A) -> Signal<A> {
        self.fold(initial, |_, value| value.clone())
    }

    /// On each emission of this stream, read `signal`'s current value and
    /// combine. Updates to `signal` never trigger an emission.
    pub fn with_latest_from<B, C, F>(&self, signal: &Signal<B>, combine: F) -> EventStream<C>
    where
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        F: Fn(&A, &B) -> C + Send + Sync + 'static,
    {
        EventStream {
            node: SampleCombineNode::create(
                Arc::clone(&self.node),
                Arc::clone(&signal.node),
                combine,
            ),
        }
    }

    /// On each emission of this stream, emit `signal`'s current value.
    pub fn sample<B>(&self, signal: &Signal<B>) -> EventStream<B>
    where
        B: Clone + Send + Sync + 'static,
    {
        self.with_latest_from(signal, |_, b| b.clone())
    }

    /// Identity passthrough with lifecycle hooks; hook failures go to the
    /// unhandled-error sink.
    pub fn debug_lifecycle(&self, hooks: LifecycleHooks<A>) -> EventStream<A> {
        EventStream {
            node: DebugStreamNode::create(Arc::clone(&self.node), hooks),
        }
    }
}

impl<A> Clone for EventStream<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}
