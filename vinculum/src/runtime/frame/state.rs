//! Frame state tags.

/// Frame is suspended and nobody is polling it.
pub(crate) const IDLE: usize = 0;

/// Frame is being polled.
pub(crate) const RUNNING: usize = 1;

/// Frame was woken while being polled and must be polled again before it
/// goes back to `IDLE`.
pub(crate) const NOTIFIED: usize = 2;

/// The task finished; the frame is never polled again.
pub(crate) const COMPLETED: usize = 3;

/// The completed task was moved out of the frame.
pub(crate) const TAKEN: usize = 4;
