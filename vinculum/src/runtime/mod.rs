//! Core execution components.
//!
//! This module contains the pieces every asynchronous unit is built from:
//!
//! - lazy [`Task`]s and their result cells,
//! - frames, which let a task resume on the thread that wakes it,
//! - the blocking bridge [`sync_wait`],
//! - the fan-in combinator [`when_all_ready`].
//!
//! Nothing here owns a thread. Work runs on the threads that await it or
//! that resume it, typically the workers of a
//! [`DispatchService`](crate::DispatchService).

mod frame;
mod sync_wait;
mod when_all;

pub mod task;

pub use sync_wait::sync_wait;
pub use task::{Task, WhenReady};
pub use when_all::{WhenAllReady, WhenAllTask, when_all_ready};
