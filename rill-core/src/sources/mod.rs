//! Source Nodes
//!
//! The roots of the observable graph. Sources have rank 1 and no parents;
//! they inject values by opening transactions.
//!
//! - [`EventBus`](event_bus::EventBus): a programmatic stream source.
//! - [`Var`](var::Var): a programmatic signal source.
//! - [`EventStream::from_external`](crate::observable::stream::EventStream::from_external):
//!   a stream source wired to an external producer on start and torn down
//!   on stop.

pub mod event_bus;
pub mod external;
pub mod var;

pub use event_bus::EventBus;
pub use external::SourceHandle;
pub use var::Var;
