//! Error Types
//!
//! Every emission in the engine is a try-value: a `Result` carrying either a
//! success of the observable's element type or an [`ObservableError`].
//! Errors flow through the graph along the same edges as values, so the
//! error type must be cheap to clone (one failure can fan out to many
//! observers and latch into several signals at once).
//!
//! The taxonomy is semantic, not structural:
//!
//! - [`ObservableError::Combinator`] — a user-supplied projection or
//!   combinator reported failure.
//! - [`ObservableError::Source`] — an external source signaled failure.
//! - [`ObservableError::ConnectionClosed`] — a connection-backed source was
//!   closed by the remote end.
//! - [`ObservableError::Callback`] — a lifecycle hook failed; these are
//!   routed to the unhandled-error sink and never travel downstream.

use thiserror::Error;

/// An error traveling through the observable graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservableError {
    /// A projection or combinator reported failure.
    #[error("combinator failed: {0}")]
    Combinator(String),

    /// An external source signaled failure.
    #[error("source failed: {0}")]
    Source(String),

    /// A connection-backed source was closed by the remote end.
    #[error("connection closed")]
    ConnectionClosed,

    /// A lifecycle callback failed.
    #[error("lifecycle callback failed: {0}")]
    Callback(String),
}

/// The carrier for every emission: success with a value, or failure with an
/// [`ObservableError`].
pub type TryValue<A> = Result<A, ObservableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_context() {
        let err = ObservableError::Combinator("division by zero".into());
        assert_eq!(err.to_string(), "combinator failed: division by zero");

        let err = ObservableError::Source("socket reset".into());
        assert_eq!(err.to_string(), "source failed: socket reset");

        assert_eq!(
            ObservableError::ConnectionClosed.to_string(),
            "connection closed"
        );
    }

    #[test]
    fn errors_are_cloneable_and_comparable() {
        let err = ObservableError::Combinator("boom".into());
        let copy = err.clone();
        assert_eq!(err, copy);
        assert_ne!(err, ObservableError::ConnectionClosed);
    }
}
