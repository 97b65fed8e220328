use crate::error::Result;
use crate::runtime::frame::{Frame, Notify};
use crate::runtime::task::Task;
use crate::sync::ManualResetEvent;

use std::sync::Arc;

impl Notify for ManualResetEvent {
    fn notify(&self) {
        self.set();
    }
}

/// Runs a task to completion, blocking the current thread.
///
/// This is the synchronous entry point into the crate, typically used from
/// `main` or from tests. The task starts on the calling thread and runs until
/// its first real suspension; the thread then sleeps until whichever thread
/// resumes the task has driven it to completion.
///
/// # Errors
///
/// Replays the failure captured by the task, or [`Error::BrokenTask`] for
/// an empty task.
///
/// [`Error::BrokenTask`]: crate::Error::BrokenTask
///
/// # Examples
///
/// ```rust
/// use vinculum::{Task, sync_wait};
///
/// let answer = sync_wait(Task::from_future(async { 42 }));
/// assert_eq!(answer.unwrap(), 42);
/// ```
pub fn sync_wait<T: Send + 'static>(task: Task<T>) -> Result<T> {
    let event = Arc::new(ManualResetEvent::new(false));
    let frame = Frame::new(task, event.clone());

    frame.start();
    event.wait();

    match frame.take_task() {
        Some(task) => task.into_result(),
        None => unreachable!("completion was signalled before the task completed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    use std::thread;
    use std::time::Duration;

    #[test]
    fn empty_task_is_broken() {
        assert!(matches!(sync_wait(Task::<()>::empty()), Err(Error::BrokenTask)));
    }

    #[test]
    fn waits_for_a_resumption_from_another_thread() {
        let (sender, receiver) = std::sync::mpsc::channel::<std::task::Waker>();

        thread::spawn(move || {
            let waker = receiver.recv().unwrap();
            thread::sleep(Duration::from_millis(10));
            waker.wake();
        });

        let task = Task::from_future(async move {
            let mut sender = Some(sender);
            std::future::poll_fn(move |cx| match sender.take() {
                Some(sender) => {
                    sender.send(cx.waker().clone()).unwrap();
                    std::task::Poll::Pending
                }
                None => std::task::Poll::Ready(()),
            })
            .await;
            "done"
        });

        assert_eq!(sync_wait(task).unwrap(), "done");
    }
}
