//! Timer machinery of the dispatch service.
//!
//! Timed waits are handed to a dedicated thread through a lock-free intake
//! list. The thread keeps them in a [`TimerQueue`](queue::TimerQueue) and
//! fires each one when it is due or as soon as its wait is cancelled.

mod intake;
mod queue;
mod thread;

pub(crate) use queue::{Cancellable, TimerNode};
pub(crate) use thread::TimerThread;
