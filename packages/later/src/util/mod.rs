//! Tokio task utilities.

pub(crate) mod cancel_on_drop;

pub use self::cancel_on_drop::CancelOnDrop;
