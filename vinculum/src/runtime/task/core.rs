use super::cell::ResultCell;
use super::state::Stage;
use crate::error::{Error, Result};

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

type Body<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// The continuation record owned by a [`Task`].
///
/// It holds the body until it completes, then only the outcome.
struct Record<T> {
    /// Lifecycle of the body.
    stage: Stage,

    /// The body future. Dropped as soon as it produces its outcome.
    body: Option<Body<T>>,

    /// Outcome of the body, written exactly once.
    cell: ResultCell<T>,
}

/// A lazy, single-result asynchronous unit.
///
/// A `Task` owns its body but never runs it on its own: the body is polled
/// inline by whoever awaits the task, so the awaiting context and the task
/// share one chain of resumptions. A task is not `Clone`; moving it moves
/// the only handle to its record.
///
/// Awaiting a task by value yields its result and moves the value out. Use
/// [`when_ready`](Self::when_ready) to wait without consuming it and
/// [`result`](Self::result) to read the outcome afterwards.
///
/// A task whose record was moved out with [`take`](Self::take), or one
/// created with [`Task::empty`], is *empty*: it is always ready and every
/// read reports [`Error::BrokenTask`].
///
/// # Examples
///
/// ```rust,ignore
/// let hello = Task::ready(String::from("hello"));
/// let greeting = Task::new(async move {
///     let head = hello.await?;
///     Ok(head + "world")
/// });
///
/// assert_eq!(vinculum::sync_wait(greeting).unwrap(), "helloworld");
/// ```
pub struct Task<T> {
    record: Option<Box<Record<T>>>,
}

impl<T: Send + 'static> Task<T> {
    /// Creates a task from a fallible body.
    ///
    /// Nothing runs until the task is awaited.
    pub fn new<F>(body: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_record(Stage::Created, Some(Box::pin(body)), ResultCell::new())
    }

    /// Creates a task from a body that cannot fail.
    pub fn from_future<F>(body: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::new(async move { Ok(body.await) })
    }

    /// Creates a task that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let mut cell = ResultCell::new();
        cell.complete(Ok(value));

        Self::with_record(Stage::Completed, None, cell)
    }

    /// Creates a task that is already completed with `error`.
    pub fn failed(error: Error) -> Self {
        let mut cell = ResultCell::new();
        cell.complete(Err(error));

        Self::with_record(Stage::Completed, None, cell)
    }

    fn with_record(stage: Stage, body: Option<Body<T>>, cell: ResultCell<T>) -> Self {
        Self {
            record: Some(Box::new(Record { stage, body, cell })),
        }
    }
}

impl<T> Task<T> {
    /// Creates an empty task.
    pub const fn empty() -> Self {
        Self { record: None }
    }

    /// Moves the record out, leaving an empty task behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns `true` if this task has no record.
    pub fn is_empty(&self) -> bool {
        self.record.is_none()
    }

    /// Returns `true` if the task is empty or has completed.
    ///
    /// This never runs the body.
    pub fn is_ready(&self) -> bool {
        self.record
            .as_ref()
            .is_none_or(|record| record.stage == Stage::Completed)
    }

    /// Returns a future that completes when the task does, without
    /// consuming its result.
    pub fn when_ready(&mut self) -> WhenReady<'_, T> {
        WhenReady { task: self }
    }

    /// Borrows the value produced by the task, or replays its failure.
    ///
    /// Every call on a failed task returns the same error again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrokenTask`] for an empty task, and the captured
    /// error for a failed one.
    ///
    /// # Panics
    ///
    /// Panics if the task has not completed yet, or if its value was
    /// already moved out.
    pub fn result(&self) -> Result<&T> {
        match &self.record {
            Some(record) => record.cell.get(),
            None => Err(Error::BrokenTask),
        }
    }

    /// Consumes the task and returns its value, or replays its failure.
    ///
    /// # Errors
    ///
    /// Same as [`result`](Self::result).
    ///
    /// # Panics
    ///
    /// Panics if the task has not completed yet.
    pub fn into_result(mut self) -> Result<T> {
        match self.record.as_mut() {
            Some(record) => record.cell.take(),
            None => Err(Error::BrokenTask),
        }
    }

    /// Drives the body until it completes.
    ///
    /// On completion the outcome is stored and the body is dropped. A panic
    /// raised by the body is captured as [`Error::Panicked`].
    pub(crate) fn poll_complete(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(record) = self.record.as_mut() else {
            return Poll::Ready(());
        };

        let Some(body) = record.body.as_mut() else {
            return Poll::Ready(());
        };

        record.stage = Stage::Started;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(cx))) {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(outcome)) => outcome,
            Err(payload) => Err(Error::from_panic(payload)),
        };

        record.body = None;
        record.cell.complete(outcome);
        record.stage = Stage::Completed;

        Poll::Ready(())
    }
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        ready!(this.poll_complete(cx));

        Poll::Ready(match this.record.as_mut() {
            Some(record) => record.cell.take(),
            None => Err(Error::BrokenTask),
        })
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("stage", &self.record.as_ref().map(|record| record.stage))
            .finish()
    }
}

/// Future returned by [`Task::when_ready`].
///
/// Completes with `()` once the task has completed; the result stays in the
/// task.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WhenReady<'a, T> {
    task: &'a mut Task<T>,
}

impl<T> Future for WhenReady<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().task.poll_complete(cx)
    }
}
