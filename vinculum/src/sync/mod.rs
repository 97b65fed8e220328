//! Blocking synchronization primitives.
//!
//! The runtime itself suspends work through wakers; the primitives here are
//! for the places where a real thread has to stop and wait, such as
//! [`sync_wait`](crate::sync_wait).
//!
//! The current primitives include:
//! - [`ManualResetEvent`]: a reusable, manually reset signal.

mod event;

pub use event::ManualResetEvent;
