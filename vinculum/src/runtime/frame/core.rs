use super::state::{COMPLETED, IDLE, NOTIFIED, RUNNING, TAKEN};
use crate::runtime::task::Task;

use std::cell::UnsafeCell;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Waker};

/// Receives the completion of a [`Frame`].
pub(crate) trait Notify: Send + Sync {
    /// Called exactly once, on the thread that completed the frame.
    fn notify(&self);
}

/// A task that resumes on whichever thread wakes it.
///
/// The frame is polled by at most one thread at a time. Exclusive access to
/// the task is granted by the state word:
///
/// - a wake on an `IDLE` frame claims it and polls it on the waking thread;
/// - a wake on a frame that is being polled only marks it `NOTIFIED`, and
///   the polling thread repeats the poll before the frame goes back to
///   `IDLE`.
///
/// Waking never waits for another thread. Once the task completes the state
/// becomes `COMPLETED` and the notifier runs.
pub(crate) struct Frame<T> {
    task: UnsafeCell<Task<T>>,
    state: AtomicUsize,
    notifier: Arc<dyn Notify>,
}

// The task cell is only accessed by the thread that moved the frame out of
// `IDLE`, or by the single winner of the `COMPLETED -> TAKEN` transition.
unsafe impl<T: Send> Send for Frame<T> {}
unsafe impl<T: Send> Sync for Frame<T> {}

impl<T: Send + 'static> Frame<T> {
    /// Wraps `task`; `notifier` runs once the task has completed.
    pub(crate) fn new(task: Task<T>, notifier: Arc<dyn Notify>) -> Arc<Self> {
        Arc::new(Self {
            task: UnsafeCell::new(task),
            state: AtomicUsize::new(IDLE),
            notifier,
        })
    }

    /// Runs the task on the calling thread up to its first suspension.
    ///
    /// A task that is already ready completes without suspending.
    pub(crate) fn start(self: &Arc<Self>) {
        self.resume();
    }

    /// Returns `true` once the task has completed.
    pub(crate) fn is_completed(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), COMPLETED | TAKEN)
    }

    /// Moves the completed task out of the frame.
    ///
    /// Returns `None` if the task has not completed, or if it was already
    /// taken.
    pub(crate) fn take_task(&self) -> Option<Task<T>> {
        self.state
            .compare_exchange(COMPLETED, TAKEN, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        // SAFETY: winning the `COMPLETED -> TAKEN` transition makes this the
        // only access to the cell for the rest of the frame's life.
        Some(unsafe { mem::take(&mut *self.task.get()) })
    }

    /// Resumes the frame on the calling thread, or asks the thread polling
    /// it to poll again.
    pub(crate) fn resume(self: &Arc<Self>) {
        let mut state = self.state.load(Ordering::Acquire);

        loop {
            let next = match state {
                IDLE => RUNNING,
                RUNNING => NOTIFIED,
                _ => return,
            };

            match self
                .state
                .compare_exchange_weak(state, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) if next == RUNNING => return self.run(),
                Ok(_) => return,
                Err(actual) => state = actual,
            }
        }
    }

    /// Polls the task while holding the frame out of `IDLE`.
    fn run(self: &Arc<Self>) {
        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        loop {
            // SAFETY: the thread that moved the frame out of `IDLE` has
            // exclusive access to the task until it stores `IDLE` again.
            let poll = unsafe { (*self.task.get()).poll_complete(&mut cx) };

            if poll.is_ready() {
                self.state.store(COMPLETED, Ordering::Release);
                self.notifier.notify();
                return;
            }

            // A wake during the poll left `NOTIFIED` behind: poll again.
            match self
                .state
                .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(NOTIFIED) => self.state.store(RUNNING, Ordering::Release),
                Err(other) => unreachable!("frame left the running state while polled: {other}"),
            }
        }
    }
}
