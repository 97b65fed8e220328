use parking_lot::{Condvar, Mutex};

use std::collections::VecDeque;
use std::task::Waker;

/// An event delivered to a worker of the dispatch service.
pub(crate) enum Event {
    /// Resume a suspended operation on the worker that receives it.
    Resume(Waker),

    /// Make the receiving worker re-check the stop flag.
    WakeUp,
}

/// Queue of events waiting for a worker.
///
/// Every posted event is delivered to exactly one worker. Workers that find
/// the queue empty park on a condition variable until the next post.
pub(crate) struct CompletionPort {
    /// Events not yet delivered, oldest first.
    queue: Mutex<VecDeque<Event>>,

    /// Wakes a parked worker when an event is posted.
    condvar: Condvar,
}

impl CompletionPort {
    /// Creates an empty port.
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }

    /// Posts an event and wakes one parked worker.
    pub(crate) fn post(&self, event: Event) {
        self.queue.lock().push_back(event);
        self.condvar.notify_one();
    }

    /// Takes the next event.
    ///
    /// With `wait` set, parks the calling thread until an event is
    /// available; otherwise returns `None` if the queue is empty.
    pub(crate) fn next_event(&self, wait: bool) -> Option<Event> {
        let mut queue = self.queue.lock();

        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }

            if !wait {
                return None;
            }

            self.condvar.wait(&mut queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn empty_port_does_not_block_without_wait() {
        let port = CompletionPort::new();
        assert!(port.next_event(false).is_none());
    }

    #[test]
    fn events_are_delivered_in_order() {
        let port = CompletionPort::new();
        port.post(Event::WakeUp);
        port.post(Event::Resume(Waker::noop().clone()));

        assert!(matches!(port.next_event(false), Some(Event::WakeUp)));
        assert!(matches!(port.next_event(true), Some(Event::Resume(_))));
        assert!(port.next_event(false).is_none());
    }

    #[test]
    fn post_releases_a_parked_worker() {
        let port = Arc::new(CompletionPort::new());
        let worker = {
            let port = port.clone();
            thread::spawn(move || port.next_event(true).is_some())
        };

        thread::sleep(Duration::from_millis(10));
        port.post(Event::WakeUp);

        assert!(worker.join().unwrap());
    }
}
