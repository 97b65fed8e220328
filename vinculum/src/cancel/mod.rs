//! Cooperative cancellation.
//!
//! A [`CancellationSource`] requests cancellation; the
//! [`CancellationToken`]s it hands out observe the request and run
//! registered callbacks when it happens. Timed waits on a
//! [`DispatchService`](crate::DispatchService) take a token.

mod token;

pub use token::{CancellationRegistration, CancellationSource, CancellationToken};
