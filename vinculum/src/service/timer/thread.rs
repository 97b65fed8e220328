use super::intake::IntakeList;
use super::queue::{Cancellable, TimerNode, TimerQueue};
use crate::service::schedule::TimedState;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

type Timer = Arc<TimedState>;

/// A signal that releases one wait and then clears itself.
struct AutoResetEvent {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl AutoResetEvent {
    fn new() -> Self {
        Self {
            signalled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.signalled.lock() = true;
        self.condvar.notify_one();
    }

    /// Waits until signalled or until `deadline`, whichever comes first.
    /// `None` waits for the signal only.
    fn wait_until(&self, deadline: Option<Instant>) {
        let mut signalled = self.signalled.lock();

        while !*signalled {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut signalled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.condvar.wait(&mut signalled),
            }
        }

        *signalled = false;
    }
}

/// State shared between the timer thread and the threads arming timers.
pub(crate) struct TimerShared {
    /// Newly armed timers not yet seen by the timer thread.
    intake: IntakeList<Timer>,

    /// Set when some armed timer may have been cancelled.
    cancellation_requested: AtomicBool,

    shutdown_requested: AtomicBool,
    wake: AutoResetEvent,
}

impl TimerShared {
    /// Asks the timer thread to sweep cancelled timers.
    pub(crate) fn request_cancellation(&self) {
        self.cancellation_requested.store(true, Ordering::Release);
        self.wake.set();
    }
}

/// The dedicated thread that fires timed waits.
///
/// Only this thread touches the [`TimerQueue`]. Other threads hand timers
/// over through the intake list and wake it when the list goes from empty to
/// non-empty. Dropping the handle stops and joins the thread.
pub(crate) struct TimerThread {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    /// Starts the timer thread.
    ///
    /// # Errors
    ///
    /// Fails if the operating system refuses to create the thread.
    pub(crate) fn spawn(name: String, capacity: usize) -> io::Result<Self> {
        let shared = Arc::new(TimerShared {
            intake: IntakeList::new(),
            cancellation_requested: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            wake: AutoResetEvent::new(),
        });

        let handle = thread::Builder::new().name(name.clone()).spawn({
            let shared = shared.clone();
            move || run(&shared, capacity)
        })?;

        debug!(thread = %name, capacity, "timer thread started");

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Returns the state shared with the thread.
    pub(crate) fn shared(&self) -> Arc<TimerShared> {
        self.shared.clone()
    }

    /// Hands a timer over to the thread.
    pub(crate) fn arm(&self, node: Box<TimerNode<Timer>>) {
        if self.shared.intake.push(node) {
            self.shared.wake.set();
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shared.shutdown_requested.store(true, Ordering::Release);
        self.shared.wake.set();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Main timer loop.
///
/// Each turn:
/// 1. Sweep cancelled timers if a sweep was requested
/// 2. Drain the intake list, firing timers that are already due or cancelled
/// 3. Fire every due timer
/// 4. Sleep until the earliest due time or the next signal
fn run(shared: &TimerShared, capacity: usize) {
    let mut queue = TimerQueue::<Timer>::with_capacity(capacity);

    while !shared.shutdown_requested.load(Ordering::Acquire) {
        if shared.cancellation_requested.swap(false, Ordering::AcqRel) && !queue.is_empty() {
            let mut swept = 0_usize;
            queue.remove_cancelled(|timer| {
                swept += 1;
                timer.arrive();
            });

            debug!(swept, "cancelled timers swept");
        }

        let now = Instant::now();
        let mut drained = 0_usize;

        for node in shared.intake.take_all() {
            drained += 1;

            if node.due <= now || node.item.is_cancelled() {
                node.item.arrive();
            } else {
                queue.enqueue(node);
            }
        }

        if drained > 0 {
            trace!(drained, armed = queue.len(), "intake drained");
        }

        queue.dequeue_due(Instant::now(), |timer| timer.arrive());

        shared.wake.wait_until(queue.earliest_due_time());
    }

    let mut abandoned = 0_usize;
    queue.drain(|_| abandoned += 1);
    abandoned += shared.intake.take_all().count();

    debug!(abandoned, "timer thread exiting");
}
