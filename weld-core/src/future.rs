//! Helpers for asynchronous event notification.

pub use futures::future::{BoxFuture, FutureExt};
