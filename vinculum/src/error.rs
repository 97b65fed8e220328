//! Error type shared by every asynchronous unit in the crate.
//!
//! Failures are stored in a task's result cell and replayed every time the
//! result is read, so the error is cheap to clone: payloads live behind
//! [`Arc`].

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A convenient alias for results produced by tasks.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures observed when consuming the result of an asynchronous operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The task has no continuation record: it was default-constructed or
    /// its record was moved out with [`Task::take`](crate::Task::take).
    #[error("broken task: the task has no continuation record")]
    BrokenTask,

    /// The body of a task returned an error.
    #[error("unhandled failure: {0}")]
    Failure(Arc<dyn StdError + Send + Sync + 'static>),

    /// The body of a task panicked while it was being polled.
    #[error("task panicked: {0}")]
    Panicked(Arc<str>),

    /// A timed wait was consumed after cancellation was requested.
    #[error("operation cancelled")]
    OperationCancelled,

    /// The dispatch service could not start its timer thread.
    #[error("failed to start the timer thread: {0}")]
    TimerThread(Arc<io::Error>),
}

impl Error {
    /// Wraps an arbitrary error raised inside a task body.
    pub fn failure<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::Failure(Arc::from(error.into()))
    }

    /// Creates a failure from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::failure(message.to_string())
    }

    /// Returns `true` if this error reports a cancelled operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::OperationCancelled)
    }

    /// Converts a panic payload caught while polling a task body.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            Arc::from(*text)
        } else if let Some(text) = payload.downcast_ref::<String>() {
            Arc::from(text.as_str())
        } else {
            Arc::from("non-string panic payload")
        };

        Self::Panicked(message)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::failure(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_keep_their_message() {
        let error = Error::from_panic(Box::new("boom"));
        assert_eq!(error.to_string(), "task panicked: boom");

        let error = Error::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(error.to_string(), "task panicked: owned boom");

        let error = Error::from_panic(Box::new(7_u32));
        assert_eq!(error.to_string(), "task panicked: non-string panic payload");
    }

    #[test]
    fn failures_replay_through_clones() {
        let error = Error::msg("disk on fire");
        let replay = error.clone();

        assert_eq!(error.to_string(), replay.to_string());
        assert!(!replay.is_cancelled());
        assert!(Error::OperationCancelled.is_cancelled());
    }
}
