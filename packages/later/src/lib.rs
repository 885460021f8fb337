//! Composition of asynchronous values on top of tokio.
//!
//! - [`Future`]: work that starts immediately and resolves to one value.
//! - [`Deferred`]: like `Future`, but idle until [`Deferred::start`] is called.
//! - [`Stream`]: work that emits any number of values through an [`Emitter`].
//! - [`Publisher`]: a latest-value cell that notifies [`Subscriber`]s, and can be fed by any of
//!   the above.
//! - [`SendableValue`]: a lock-guarded cell for sharing mutable state between tasks.
//!
//! All primitives spawn their work onto the ambient tokio runtime, so they must be constructed
//! (or, for `Deferred` and `Stream`, started) from within one.

#[macro_use]
extern crate tracing;

mod deferred;
mod future;
mod publisher;
mod sendable_value;
mod stream;
mod task;
pub mod util;

#[cfg(feature = "time")]
mod schedule;
#[cfg(feature = "network")]
pub mod network;

pub use crate::{
    deferred::{Deferred, DeferredBuilder},
    future::{Future, FutureBuilder},
    publisher::{AnySubscriber, Publisher, Subscriber, SubscriberId},
    sendable_value::SendableValue,
    stream::{Emitter, Stream, StreamBuilder},
};
#[cfg(feature = "time")]
pub use crate::schedule::schedule;
pub use tokio_util::sync::CancellationToken;

/// Error types
pub mod error {
    use std::sync::Arc;
    use thiserror::Error;

    /// Terminal failure of a [`Future`](crate::Future), [`Deferred`](crate::Deferred) or
    /// [`Stream`](crate::Stream)
    ///
    /// Cloning is cheap. The same error is handed to the failure hook and to every awaiter.
    #[derive(Debug, Clone, Error)]
    pub enum Error {
        /// The value of a [`Deferred`](crate::Deferred) was read before it was started
        #[error("deferred task was not started")]
        DeferredNotStarted,
        /// The task observed a cancellation request before it completed
        #[error("task was cancelled")]
        Cancelled,
        /// The work function failed
        #[error("{0:#}")]
        Work(Arc<anyhow::Error>),
    }

    impl Error {
        /// The work function's own error, if this is a work failure
        pub fn cause(&self) -> Option<&anyhow::Error> {
            match self {
                Error::Work(cause) => Some(cause),
                _ => None,
            }
        }

        /// Whether this error represents an honored cancellation
        pub fn is_cancelled(&self) -> bool {
            matches!(self, Error::Cancelled)
        }
    }

    impl From<anyhow::Error> for Error {
        fn from(error: anyhow::Error) -> Self {
            // an error that already passed through this crate keeps its kind
            match error.downcast::<Error>() {
                Ok(error) => error,
                Err(error) => Error::Work(Arc::new(error)),
            }
        }
    }

    /// Result alias for outcomes produced by this crate
    pub type Result<T> = std::result::Result<T, Error>;

    #[cfg(test)]
    mod tests {
        use super::*;

        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        #[test]
        fn work_error_keeps_cause() {
            let error = Error::from(anyhow::Error::new(Boom));
            assert!(error.cause().unwrap().is::<Boom>());
            assert_eq!(error.to_string(), "boom");
        }

        #[test]
        fn nested_errors_keep_kind() {
            let error = Error::from(anyhow::Error::new(Error::Cancelled));
            assert!(error.is_cancelled());
            let error = Error::from(anyhow::Error::new(Error::DeferredNotStarted));
            assert!(matches!(error, Error::DeferredNotStarted));
        }
    }
}

pub use crate::error::{Error, Result};
