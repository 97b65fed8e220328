use super::DispatchService;
use super::port::{CompletionPort, Event};
use super::timer::{Cancellable, TimerNode};
use crate::cancel::{CancellationRegistration, CancellationToken};
use crate::error::{Error, Result};
use crate::utils::thread_token;

use tracing::trace;

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::time::{Duration, Instant};

/// Two-party meeting point.
///
/// Each party arrives exactly once; the second one to arrive learns that it
/// is second and takes over whatever must happen once both are done.
pub(crate) struct Rendezvous {
    arrived: AtomicBool,
}

impl Rendezvous {
    pub(crate) const fn new() -> Self {
        Self {
            arrived: AtomicBool::new(false),
        }
    }

    /// Returns `true` if the other party already arrived.
    pub(crate) fn arrive(&self) -> bool {
        self.arrived.swap(true, Ordering::AcqRel)
    }
}

/// Where a posted resumption ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Landing {
    /// No worker has run the resumption yet.
    Pending,

    /// A worker ran it on the thread now polling.
    Here,

    /// A worker ran it, but the poll happens on some other thread.
    Elsewhere,
}

/// A resumption posted to the completion port.
///
/// Running it records the worker before waking the suspended task. The
/// task is polled by that worker unless it was still being polled
/// elsewhere when the wake arrived; [`landing`](Self::landing) tells the
/// two cases apart.
struct Hop {
    /// Token of the worker that ran the resumption, `0` until then.
    resumed_on: AtomicUsize,
    waker: Waker,
}

impl Hop {
    fn new(waker: Waker) -> Arc<Self> {
        Arc::new(Self {
            resumed_on: AtomicUsize::new(0),
            waker,
        })
    }

    /// Creates a hop and posts it to `port`.
    fn post(port: &CompletionPort, waker: Waker) -> Arc<Self> {
        let hop = Self::new(waker);
        port.post(Event::Resume(Waker::from(hop.clone())));
        hop
    }

    fn landing(&self) -> Landing {
        match self.resumed_on.load(Ordering::Acquire) {
            0 => Landing::Pending,
            worker if worker == thread_token() => Landing::Here,
            _ => Landing::Elsewhere,
        }
    }
}

impl Wake for Hop {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.resumed_on.store(thread_token(), Ordering::Release);
        self.waker.wake_by_ref();
    }
}

/// Shared state of one timed wait.
///
/// The registering thread and the timer thread each arrive once at the
/// rendezvous: the former after it has published the timer, the latter when
/// the timer is due or cancelled. The second to arrive posts the waiter's
/// resumption to the completion port.
pub(crate) struct TimedState {
    token: CancellationToken,
    rendezvous: Rendezvous,
    port: Arc<CompletionPort>,

    /// Posted by the second party to arrive.
    hop: Arc<Hop>,
}

impl TimedState {
    fn new(token: CancellationToken, waker: Waker, port: Arc<CompletionPort>) -> Self {
        Self {
            token,
            hop: Hop::new(waker),
            rendezvous: Rendezvous::new(),
            port,
        }
    }

    /// Arrives at the rendezvous on behalf of one party.
    pub(crate) fn arrive(&self) {
        if self.rendezvous.arrive() {
            self.port.post(Event::Resume(Waker::from(self.hop.clone())));
        }
    }
}

impl Cancellable for Arc<TimedState> {
    fn is_cancelled(&self) -> bool {
        self.token.is_cancellation_requested()
    }
}

/// Future returned by [`DispatchService::schedule`].
///
/// The first poll posts the awaiting task to the service and suspends; the
/// task then continues on whichever worker picks the event up. Wakes that do
/// not come from that worker leave the task suspended.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Schedule<'a> {
    service: &'a DispatchService,
    hop: Option<Arc<Hop>>,
}

impl<'a> Schedule<'a> {
    pub(super) fn new(service: &'a DispatchService) -> Self {
        Self { service, hop: None }
    }
}

impl Future for Schedule<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        match this.hop.as_ref().map(|hop| hop.landing()) {
            Some(Landing::Here) => Poll::Ready(()),
            Some(Landing::Pending) => Poll::Pending,

            None | Some(Landing::Elsewhere) => {
                this.hop = Some(Hop::post(this.service.port(), cx.waker().clone()));
                trace!("resumption posted");

                Poll::Pending
            }
        }
    }
}

/// Future returned by [`DispatchService::schedule_after`].
///
/// Resolves on a worker of the service once the delay has elapsed, or
/// earlier if its token is cancelled. Cancellation is reported as
/// [`Error::OperationCancelled`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct TimedSchedule<'a> {
    service: &'a DispatchService,
    delay: Duration,
    token: CancellationToken,
    hop: Option<Arc<Hop>>,
    registration: Option<CancellationRegistration>,
}

impl<'a> TimedSchedule<'a> {
    pub(super) fn new(service: &'a DispatchService, delay: Duration, token: CancellationToken) -> Self {
        Self {
            service,
            delay,
            token,
            hop: None,
            registration: None,
        }
    }

    /// Publishes the timer and arrives at the rendezvous.
    fn register(&mut self, waker: &Waker) -> Result<()> {
        let timer = self.service.timer_thread()?;
        let state = Arc::new(TimedState::new(
            self.token.clone(),
            waker.clone(),
            self.service.port().clone(),
        ));

        if self.token.can_be_cancelled() {
            let shared = timer.shared();
            self.registration = Some(self.token.register(move || shared.request_cancellation()));
        }

        self.hop = Some(state.hop.clone());
        timer.arm(TimerNode::new(deadline_after(self.delay), state.clone()));
        trace!(delay = ?self.delay, "timer armed");

        state.arrive();

        Ok(())
    }
}

impl Future for TimedSchedule<'_> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.hop.as_ref().map(|hop| hop.landing()) {
            None => {
                if this.token.is_cancellation_requested() {
                    return Poll::Ready(Err(Error::OperationCancelled));
                }

                if let Err(error) = this.register(cx.waker()) {
                    return Poll::Ready(Err(error));
                }

                Poll::Pending
            }

            Some(Landing::Here) => {
                this.registration = None;
                Poll::Ready(this.token.throw_if_cancellation_requested())
            }

            Some(Landing::Pending) => Poll::Pending,

            // The timer fired; only the hop to a worker remains.
            Some(Landing::Elsewhere) => {
                this.hop = Some(Hop::post(this.service.port(), cx.waker().clone()));
                Poll::Pending
            }
        }
    }
}

/// Returns the instant `delay` from now, saturating far in the future.
fn deadline_after(delay: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
