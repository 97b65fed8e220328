use crate::runtime::frame::Notify;

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::Waker;

/// Joins `N` completions with one awaiting party.
///
/// The count starts at `N` and is decremented `N + 1` times over the
/// counter's life: once by every completion and once by the awaiter after it
/// has stored its waker. Whoever observes the previous value `0` is last:
/// the awaiter then does not suspend, a completion wakes the awaiter. Either
/// way there is exactly one resumption.
///
/// The last decrement wraps the count to `usize::MAX`; it is never read
/// again afterwards.
pub(crate) struct WhenAllCounter {
    count: AtomicUsize,

    /// Written once by the awaiter, before its decrement.
    waker: UnsafeCell<Option<Waker>>,

    /// Set by the last decrement.
    complete: AtomicBool,
}

// The waker slot is written only before the awaiter's decrement and read
// only after the last one; the `AcqRel` decrements order the two.
unsafe impl Send for WhenAllCounter {}
unsafe impl Sync for WhenAllCounter {}

impl WhenAllCounter {
    /// Creates a counter expecting `count` completions.
    pub(crate) fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            waker: UnsafeCell::new(None),
            complete: AtomicBool::new(false),
        }
    }

    /// Returns `true` once every completion and the awaiter have arrived.
    pub(crate) fn is_ready(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Registers the awaiter.
    ///
    /// Returns `false` if every completion already happened, in which case
    /// the awaiter must not suspend.
    ///
    /// # Safety
    ///
    /// Must be called at most once per counter.
    pub(crate) unsafe fn try_await(&self, waker: Waker) -> bool {
        // SAFETY: nobody reads the slot before the decrement below.
        unsafe { *self.waker.get() = Some(waker) };

        if self.count.fetch_sub(1, Ordering::AcqRel) == 0 {
            self.complete.store(true, Ordering::Release);
            return false;
        }

        true
    }
}

impl Notify for WhenAllCounter {
    fn notify(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) != 0 {
            return;
        }

        self.complete.store(true, Ordering::Release);

        // SAFETY: the awaiter stored the waker before its own decrement, and
        // this is the last decrement.
        if let Some(waker) = unsafe { (*self.waker.get()).take() } {
            waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::task::Wake;

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn awaiter_arriving_last_does_not_suspend() {
        let counter = WhenAllCounter::new(2);
        let wakes = Arc::new(CountingWaker::default());

        counter.notify();
        counter.notify();

        assert!(!unsafe { counter.try_await(Waker::from(wakes.clone())) });
        assert!(counter.is_ready());
        assert_eq!(wakes.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn last_completion_wakes_the_awaiter_once() {
        let counter = WhenAllCounter::new(3);
        let wakes = Arc::new(CountingWaker::default());

        counter.notify();
        assert!(unsafe { counter.try_await(Waker::from(wakes.clone())) });
        assert!(!counter.is_ready());

        counter.notify();
        assert_eq!(wakes.0.load(Ordering::SeqCst), 0);

        counter.notify();
        assert!(counter.is_ready());
        assert_eq!(wakes.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_set_completes_on_registration() {
        let counter = WhenAllCounter::new(0);
        assert!(!unsafe { counter.try_await(Waker::noop().clone()) });
        assert!(counter.is_ready());
    }
}
