use parking_lot::{Condvar, Mutex};

/// A blocking, manually reset signal.
///
/// Once [`set`](Self::set), every current and future [`wait`](Self::wait)
/// returns immediately until the event is [`reset`](Self::reset). Waiting
/// parks the thread on a condition variable; it never spins.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use vinculum::sync::ManualResetEvent;
///
/// let event = Arc::new(ManualResetEvent::new(false));
/// let signaller = event.clone();
///
/// thread::spawn(move || signaller.set());
///
/// event.wait();
/// assert!(event.is_set());
/// ```
#[derive(Debug, Default)]
pub struct ManualResetEvent {
    /// Whether the event is signalled.
    ///
    /// Guarded by a lock so that a `set` racing with a waiter that has just
    /// observed `false` cannot be lost.
    set: Mutex<bool>,

    /// Parks waiters until the event is signalled.
    condvar: Condvar,
}

impl ManualResetEvent {
    /// Creates an event, signalled or not.
    pub fn new(initially_set: bool) -> Self {
        Self {
            set: Mutex::new(initially_set),
            condvar: Condvar::new(),
        }
    }

    /// Signals the event and releases every waiter.
    pub fn set(&self) {
        let mut set = self.set.lock();
        *set = true;
        self.condvar.notify_all();
    }

    /// Clears the signal.
    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    /// Returns `true` if the event is signalled.
    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Blocks the calling thread until the event is signalled.
    pub fn wait(&self) {
        let mut set = self.set.lock();

        while !*set {
            self.condvar.wait(&mut set);
        }
    }
}
