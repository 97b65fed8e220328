use super::builder::ServiceBuilder;
use super::port::{CompletionPort, Event};
use super::schedule::{Schedule, TimedSchedule};
use super::timer::TimerThread;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

use crossbeam_utils::Backoff;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Bit of the thread state set once a stop was requested.
const STOP_REQUESTED_FLAG: usize = 1;

/// Amount added to the thread state by each thread inside the event loop.
const ACTIVE_THREAD_COUNT_INCREMENT: usize = 2;

/// Shared service state.
struct Inner {
    /// Stop flag in bit 0, active event-loop callers in the bits above.
    thread_state: AtomicUsize,

    /// Outstanding work announced through `notify_work_started`.
    work_count: AtomicUsize,

    port: Arc<CompletionPort>,

    /// Started on the first timed wait; stopped when the service drops.
    timer: OnceCell<TimerThread>,

    timer_thread_name: String,
    timer_capacity: usize,
}

/// Runs suspended work on the threads that call its event loop.
///
/// Threads become workers by calling one of the `process_*` functions.
/// Tasks hop onto a worker by awaiting [`schedule`](Self::schedule), or by
/// awaiting [`schedule_after`](Self::schedule_after) to be resumed there once
/// a delay has elapsed; timed waits are tracked by a dedicated timer thread
/// started on first use.
///
/// `DispatchService` is a cheap handle: clones share the same service, and
/// the timer thread is joined when the last clone drops.
///
/// # Examples
///
/// ```rust
/// use std::thread;
/// use vinculum::{DispatchService, Task, sync_wait};
///
/// let service = DispatchService::new();
///
/// let worker = {
///     let service = service.clone();
///     thread::spawn(move || service.process_events())
/// };
///
/// let on_worker = {
///     let service = service.clone();
///     Task::from_future(async move {
///         service.schedule().await;
///         thread::current().id()
///     })
/// };
///
/// assert_ne!(sync_wait(on_worker).unwrap(), thread::current().id());
///
/// service.stop();
/// worker.join().unwrap();
/// ```
#[derive(Clone)]
pub struct DispatchService {
    inner: Arc<Inner>,
}

impl DispatchService {
    /// Creates a service with the default configuration.
    pub fn new() -> Self {
        ServiceBuilder::new().build()
    }

    pub(super) fn with_config(timer_thread_name: String, timer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                thread_state: AtomicUsize::new(0),
                work_count: AtomicUsize::new(0),
                port: Arc::new(CompletionPort::new()),
                timer: OnceCell::new(),
                timer_thread_name,
                timer_capacity,
            }),
        }
    }

    /// Returns a future that resumes the awaiting task on a worker.
    pub fn schedule(&self) -> Schedule<'_> {
        Schedule::new(self)
    }

    /// Returns a future that resumes the awaiting task on a worker once
    /// `delay` has elapsed, or as soon as `token` is cancelled.
    ///
    /// A token that is already cancelled completes the wait immediately,
    /// without arming a timer.
    ///
    /// # Errors
    ///
    /// The future fails with [`Error::OperationCancelled`] if cancellation
    /// was requested, and with [`Error::TimerThread`] if the timer thread
    /// could not be started.
    pub fn schedule_after(&self, delay: Duration, token: CancellationToken) -> TimedSchedule<'_> {
        TimedSchedule::new(self, delay, token)
    }

    /// Runs events until the service is stopped, blocking while none are
    /// pending. Returns the number of events run.
    pub fn process_events(&self) -> u64 {
        self.run_event_loop(true, u64::MAX)
    }

    /// Runs the events already pending. Returns the number of events run.
    pub fn process_pending_events(&self) -> u64 {
        self.run_event_loop(false, u64::MAX)
    }

    /// Runs one event, blocking until one is available or the service is
    /// stopped.
    pub fn process_one_event(&self) -> u64 {
        self.run_event_loop(true, 1)
    }

    /// Runs one event if one is pending.
    pub fn process_one_pending_event(&self) -> u64 {
        self.run_event_loop(false, 1)
    }

    /// Requests every worker to leave the event loop.
    ///
    /// Threads that call a `process_*` function afterwards return at once,
    /// until [`reset`](Self::reset) is called. Repeated calls have no effect.
    pub fn stop(&self) {
        let previous = self
            .inner
            .thread_state
            .fetch_or(STOP_REQUESTED_FLAG, Ordering::Release);

        if previous & STOP_REQUESTED_FLAG != 0 {
            return;
        }

        let active = previous / ACTIVE_THREAD_COUNT_INCREMENT;
        debug!(active, "dispatch service stopping");

        for _ in 0..active {
            self.inner.port.post(Event::WakeUp);
        }
    }

    /// Clears a previous stop request so that the event loop can run again.
    ///
    /// # Panics
    ///
    /// Panics if a thread is still inside the event loop.
    pub fn reset(&self) {
        let previous = self
            .inner
            .thread_state
            .fetch_and(!STOP_REQUESTED_FLAG, Ordering::Relaxed);

        assert!(
            previous < ACTIVE_THREAD_COUNT_INCREMENT,
            "reset() called while {} thread(s) are running the event loop",
            previous / ACTIVE_THREAD_COUNT_INCREMENT
        );

        debug!("dispatch service reset");
    }

    /// Returns `true` if a stop was requested and not reset since.
    pub fn is_stop_requested(&self) -> bool {
        self.inner.thread_state.load(Ordering::Acquire) & STOP_REQUESTED_FLAG != 0
    }

    /// Announces a unit of outstanding work.
    pub fn notify_work_started(&self) {
        self.inner.work_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Retires a unit of outstanding work; retiring the last one stops the
    /// service.
    pub fn notify_work_finished(&self) {
        if self.inner.work_count.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.stop();
        }
    }

    /// Announces outstanding work for as long as the returned guard lives.
    pub fn work_scope(&self) -> WorkScope {
        self.notify_work_started();

        WorkScope {
            service: self.clone(),
        }
    }

    pub(super) fn port(&self) -> &Arc<CompletionPort> {
        &self.inner.port
    }

    /// Returns the timer thread, starting it on first use.
    pub(super) fn timer_thread(&self) -> Result<&TimerThread> {
        self.inner.timer.get_or_try_init(|| {
            TimerThread::spawn(
                self.inner.timer_thread_name.clone(),
                self.inner.timer_capacity,
            )
            .map_err(|error| Error::TimerThread(Arc::new(error)))
        })
    }

    fn run_event_loop(&self, wait: bool, limit: u64) -> u64 {
        let Some(_guard) = EventLoopGuard::enter(&self.inner) else {
            return 0;
        };

        let mut processed = 0;

        while processed < limit && self.try_process_one_event(wait) {
            processed += 1;
        }

        processed
    }

    /// Returns `false` once there is nothing left to run: the port is empty
    /// (without `wait`) or a stop was requested.
    fn try_process_one_event(&self, wait: bool) -> bool {
        loop {
            match self.inner.port.next_event(wait) {
                None => return false,
                Some(Event::WakeUp) => {
                    if self.is_stop_requested() {
                        return false;
                    }
                }
                Some(Event::Resume(waker)) => {
                    waker.wake();
                    return true;
                }
            }
        }
    }
}

impl Default for DispatchService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.thread_state.load(Ordering::Relaxed);

        f.debug_struct("DispatchService")
            .field("stop_requested", &(state & STOP_REQUESTED_FLAG != 0))
            .field("active_threads", &(state / ACTIVE_THREAD_COUNT_INCREMENT))
            .field("work_count", &self.inner.work_count.load(Ordering::Relaxed))
            .field("timer_started", &self.inner.timer.get().is_some())
            .finish()
    }
}

/// Membership of the calling thread in the event loop.
struct EventLoopGuard<'a> {
    inner: &'a Inner,
}

impl<'a> EventLoopGuard<'a> {
    /// Joins the event loop unless a stop was requested.
    fn enter(inner: &'a Inner) -> Option<Self> {
        let backoff = Backoff::new();
        let mut state = inner.thread_state.load(Ordering::Relaxed);

        loop {
            if state & STOP_REQUESTED_FLAG != 0 {
                return None;
            }

            match inner.thread_state.compare_exchange_weak(
                state,
                state + ACTIVE_THREAD_COUNT_INCREMENT,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    state = actual;
                    backoff.spin();
                }
            }
        }

        trace!("entered event loop");
        Some(Self { inner })
    }
}

impl Drop for EventLoopGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .thread_state
            .fetch_sub(ACTIVE_THREAD_COUNT_INCREMENT, Ordering::Relaxed);

        trace!("left event loop");
    }
}

/// Outstanding work on a [`DispatchService`].
///
/// Created by [`DispatchService::work_scope`]. Dropping the last scope of a
/// service stops it. Cloning a scope announces one more unit of work.
#[must_use = "dropping a work scope retires its work immediately"]
pub struct WorkScope {
    service: DispatchService,
}

impl WorkScope {
    /// Returns the service this scope keeps busy.
    pub fn service(&self) -> &DispatchService {
        &self.service
    }
}

impl Clone for WorkScope {
    fn clone(&self) -> Self {
        self.service.work_scope()
    }
}

impl Drop for WorkScope {
    fn drop(&mut self) {
        self.service.notify_work_finished();
    }
}

impl fmt::Debug for WorkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkScope").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationSource;
    use crate::runtime::{Task, sync_wait};

    #[test]
    fn stopped_service_refuses_workers() {
        let service = DispatchService::new();
        service.stop();

        assert!(service.is_stop_requested());
        assert_eq!(service.process_events(), 0);

        service.reset();
        assert!(!service.is_stop_requested());
        assert_eq!(service.process_pending_events(), 0);
    }

    #[test]
    fn stop_posts_no_wake_up_without_workers() {
        let service = DispatchService::new();
        service.stop();
        service.stop();

        assert!(service.port().next_event(false).is_none());
    }

    #[test]
    fn pre_cancelled_wait_never_starts_the_timer_thread() {
        let service = DispatchService::new();
        let source = CancellationSource::new();
        source.request_cancellation();

        let wait = {
            let service = service.clone();
            let token = source.token();
            Task::new(async move { service.schedule_after(Duration::from_secs(60), token).await })
        };

        assert!(matches!(sync_wait(wait), Err(Error::OperationCancelled)));
        assert!(service.inner.timer.get().is_none());
    }

    #[test]
    fn last_work_scope_stops_the_service() {
        let service = DispatchService::new();
        let first = service.work_scope();
        let second = first.clone();

        drop(first);
        assert!(!service.is_stop_requested());

        drop(second);
        assert!(service.is_stop_requested());
    }
}
