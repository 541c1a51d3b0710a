//! Observables
//!
//! This module implements the observable graph: the node state and traits
//! every operator builds on, the observer/subscription surface, and the
//! two public observable variants.
//!
//! # Streams and Signals
//!
//! An [`EventStream`](stream::EventStream) is discrete: it has no current
//! value, emits nothing on subscribe, and drops its transient state
//! whenever it stops. A [`Signal`](signal::Signal) is continuous: it
//! latches a current value, synchronously replays that value to each new
//! observer, and keeps the value across stop/restart. Errors are transient
//! on streams and latch into a signal's current value.
//!
//! # Laziness
//!
//! Observables are created dormant and perform no work until observed.
//! The first observer starts a node, recursively starting its parents;
//! removing the last observer stops it, recursively releasing them.

pub(crate) mod node;
pub mod observer;
pub mod signal;
pub mod stream;

pub use observer::{Observer, Subscription};
pub use signal::Signal;
pub use stream::EventStream;
