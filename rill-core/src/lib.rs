//! Rill Core
//!
//! This crate provides a glitch-free functional-reactive streams runtime
//! for event-driven clients. It implements:
//!
//! - Lazy, push-based observables in two variants: discrete event streams
//!   and continuous signals with a latched current value
//! - A transactional propagation engine that drains updates in
//!   topological-rank order, so every derived observable sees a consistent
//!   snapshot of its inputs within one logical tick
//! - Start/stop lifecycle management driven by observer refcounts
//! - An error channel where every emission is a try-value, with an
//!   unhandled-error sink of last resort
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `engine`: transactions, the rank-ordered drain, and the per-thread
//!   runtime state
//! - `observable`: the node base, observers/subscriptions, and the public
//!   `EventStream` and `Signal` types
//! - `operators`: the concrete combinator nodes (map, filter, merge,
//!   combine, sample, fold, debug)
//! - `sources`: the graph roots — `EventBus`, `Var`, and external sources
//! - `error`: the try-value carrier and error taxonomy
//! - `split`: the container capability consumed by a keyed `split`
//!   operator
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_core::{Var, Observer};
//!
//! // A source signal and a diamond of derived signals.
//! let a = Var::new(1);
//! let b = a.signal().map(|x| x + 10);
//! let c = a.signal().map(|x| x * 10);
//! let d = b.combine_with(&c, |x, y| x + y);
//!
//! // The new observer synchronously receives the current value (21).
//! let sub = d.subscribe(Observer::new(|v| println!("d = {v}")));
//!
//! // One update, one consistent firing: d = 32, with no intermediates.
//! a.set(2);
//! ```
//!
//! # Execution Model
//!
//! The engine is strictly single-threaded and cooperative: one engine
//! instance exists per host thread, transactions drain to completion
//! before control returns to the caller, and user callbacks run
//! synchronously on the engine thread during firing.

pub mod engine;
pub mod error;
pub mod observable;
pub(crate) mod operators;
pub mod sources;
pub mod split;

pub use engine::runtime::{on_unhandled_error, UnhandledErrorHandle};
pub use engine::transaction::Transaction;
pub use error::{ObservableError, TryValue};
pub use observable::observer::{Observer, Subscription};
pub use observable::signal::Signal;
pub use observable::stream::EventStream;
pub use operators::debug::LifecycleHooks;
pub use sources::event_bus::EventBus;
pub use sources::external::SourceHandle;
pub use sources::var::Var;
