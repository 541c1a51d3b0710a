//! Propagation Engine
//!
//! This module implements the transactional propagation machinery:
//!
//! - `transaction`: one atomic propagation step, with a rank-ordered queue
//!   of pending observables and the drain algorithm.
//! - `runtime`: the per-thread engine state — the pending-transaction queue
//!   and the unhandled-error sink of last resort.
//!
//! # Why Transactions
//!
//! A single external event (a source firing) can reach a derived observable
//! along more than one path. Without coordination, a node downstream of a
//! diamond would observe one parent's new value paired with the other
//! parent's stale value — a glitch. The engine prevents this by draining
//! each transaction in ascending topological-rank order: a node fires only
//! after every parent that can fire in the transaction already has.

pub mod runtime;
pub mod transaction;

pub use runtime::{on_unhandled_error, UnhandledErrorHandle};
pub use transaction::Transaction;
