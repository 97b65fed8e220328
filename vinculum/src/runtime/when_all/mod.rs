//! Fan-in over a set of tasks.
//!
//! [`when_all_ready`] starts every task at once and completes when all of
//! them have completed, whatever their outcome. It never fails itself: each
//! input comes back as a [`WhenAllTask`] holding its own result.

mod counter;

use counter::WhenAllCounter;

use crate::error::Result;
use crate::runtime::frame::Frame;
use crate::runtime::task::Task;

use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Waits for every task in `tasks` to complete.
///
/// The returned future yields the tasks in input order, each wrapped in a
/// [`WhenAllTask`]. An empty input completes immediately.
///
/// Each task runs in its own frame, so it resumes on whichever thread wakes
/// it; the awaiting party is resumed by the last task to complete.
///
/// # Examples
///
/// ```rust
/// use vinculum::{Task, sync_wait, when_all_ready};
///
/// let tasks = vec![
///     Task::from_future(async { 1 }),
///     Task::from_future(async { 2 }),
/// ];
///
/// let outcome = sync_wait(Task::from_future(when_all_ready(tasks))).unwrap();
/// let values: Vec<i32> = outcome.into_iter().map(|t| t.into_result().unwrap()).collect();
///
/// assert_eq!(values, [1, 2]);
/// ```
pub fn when_all_ready<T, I>(tasks: I) -> WhenAllReady<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Task<T>>,
{
    let pending: Vec<Task<T>> = tasks.into_iter().collect();
    let counter = Arc::new(WhenAllCounter::new(pending.len()));

    WhenAllReady {
        pending,
        frames: Vec::new(),
        counter,
        started: false,
    }
}

/// Future returned by [`when_all_ready`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WhenAllReady<T> {
    /// Tasks not started yet.
    pending: Vec<Task<T>>,

    /// One frame per task once started, in input order.
    frames: Vec<Arc<Frame<T>>>,

    counter: Arc<WhenAllCounter>,
    started: bool,
}

impl<T: Send + 'static> WhenAllReady<T> {
    fn collect(&mut self) -> Vec<WhenAllTask<T>> {
        mem::take(&mut self.frames)
            .into_iter()
            .map(|frame| match frame.take_task() {
                Some(task) => WhenAllTask { task },
                None => unreachable!("fan-in completed before one of its tasks"),
            })
            .collect()
    }
}

impl<T: Send + 'static> Future for WhenAllReady<T> {
    type Output = Vec<WhenAllTask<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.started {
            if this.counter.is_ready() {
                return Poll::Ready(this.collect());
            }

            return Poll::Pending;
        }

        this.started = true;

        if this.pending.is_empty() {
            return Poll::Ready(Vec::new());
        }

        this.frames = mem::take(&mut this.pending)
            .into_iter()
            .map(|task| Frame::new(task, this.counter.clone()))
            .collect();

        for frame in &this.frames {
            frame.start();
        }

        // SAFETY: `started` guards this block, so the awaiter registers once.
        if unsafe { this.counter.try_await(cx.waker().clone()) } {
            Poll::Pending
        } else {
            Poll::Ready(this.collect())
        }
    }
}

/// A task that went through [`when_all_ready`].
///
/// It is always ready; reads behave like [`Task::result`] and
/// [`Task::into_result`].
#[derive(Debug)]
pub struct WhenAllTask<T> {
    task: Task<T>,
}

impl<T> WhenAllTask<T> {
    /// Returns `true`; the fan-in only yields completed tasks.
    pub fn is_ready(&self) -> bool {
        self.task.is_ready()
    }

    /// Borrows the task's value, or replays its failure.
    pub fn result(&self) -> Result<&T> {
        self.task.result()
    }

    /// Consumes the wrapper and returns the task's value, or its failure.
    pub fn into_result(self) -> Result<T> {
        self.task.into_result()
    }

    /// Unwraps the completed task.
    pub fn into_task(self) -> Task<T> {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    use std::task::Waker;

    #[test]
    fn empty_input_completes_on_first_poll() {
        let mut fan_in = when_all_ready(Vec::<Task<u8>>::new());
        let mut cx = Context::from_waker(Waker::noop());

        match Pin::new(&mut fan_in).poll(&mut cx) {
            Poll::Ready(tasks) => assert!(tasks.is_empty()),
            Poll::Pending => panic!("an empty fan-in must not suspend"),
        }
    }

    #[test]
    fn ready_tasks_complete_without_suspending() {
        let mut fan_in = when_all_ready([
            Task::ready(1),
            Task::failed(Error::msg("second failed")),
            Task::from_future(async { 3 }),
        ]);
        let mut cx = Context::from_waker(Waker::noop());

        let Poll::Ready(tasks) = Pin::new(&mut fan_in).poll(&mut cx) else {
            panic!("every input was ready");
        };

        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(WhenAllTask::is_ready));
        assert_eq!(*tasks[0].result().unwrap(), 1);
        assert!(tasks[1].result().is_err());
        assert!(tasks[1].result().is_err(), "failures replay");
        assert_eq!(*tasks[2].result().unwrap(), 3);
    }
}
