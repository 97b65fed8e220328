use crate::error::{Error, Result};
use crate::utils::Slab;

use parking_lot::Mutex;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Callback = Box<dyn FnOnce() + Send>;

/// State shared by a source and all of its tokens.
struct State {
    requested: AtomicBool,
    callbacks: Mutex<Slab<Callback>>,
}

impl State {
    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// The side that requests cancellation.
///
/// Cloning a source shares the same cancellation state.
#[derive(Clone)]
pub struct CancellationSource {
    state: Arc<State>,
}

impl CancellationSource {
    /// Creates a source whose cancellation has not been requested.
    pub fn new() -> Self {
        Self {
            state: Arc::new(State {
                requested: AtomicBool::new(false),
                callbacks: Mutex::new(Slab::new()),
            }),
        }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Some(self.state.clone()),
        }
    }

    /// Requests cancellation and runs every registered callback.
    ///
    /// Only the first request has an effect. Callbacks run on the calling
    /// thread, outside the registration lock.
    pub fn request_cancellation(&self) {
        if self.state.requested.swap(true, Ordering::AcqRel) {
            return;
        }

        let callbacks: Vec<Callback> = self.state.callbacks.lock().drain().collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.is_requested()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("requested", &self.is_cancellation_requested())
            .field("registrations", &self.state.callbacks.lock().len())
            .finish()
    }
}

/// The side that observes cancellation.
///
/// A token created with [`CancellationToken::none`] can never be cancelled.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Option<Arc<State>>,
}

impl CancellationToken {
    /// Returns a token that can never be cancelled.
    pub const fn none() -> Self {
        Self { state: None }
    }

    /// Returns `true` if the token is attached to a source.
    pub fn can_be_cancelled(&self) -> bool {
        self.state.is_some()
    }

    /// Returns `true` once cancellation was requested on the source.
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.is_requested())
    }

    /// Fails with [`Error::OperationCancelled`] once cancellation was
    /// requested.
    pub fn throw_if_cancellation_requested(&self) -> Result<()> {
        if self.is_cancellation_requested() {
            return Err(Error::OperationCancelled);
        }

        Ok(())
    }

    /// Registers `callback` to run when cancellation is requested.
    ///
    /// The callback runs at most once. If cancellation was already requested
    /// it runs immediately on the calling thread. Dropping the returned
    /// registration deregisters a callback that has not run yet.
    pub fn register<F>(&self, callback: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(state) = &self.state else {
            return CancellationRegistration::inert();
        };

        let mut callbacks = state.callbacks.lock();

        if state.is_requested() {
            drop(callbacks);
            callback();
            return CancellationRegistration::inert();
        }

        let key = callbacks.insert(Box::new(callback));

        CancellationRegistration {
            state: Some(state.clone()),
            key,
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("can_be_cancelled", &self.can_be_cancelled())
            .field("requested", &self.is_cancellation_requested())
            .finish()
    }
}

/// Keeps a cancellation callback registered until dropped.
#[must_use = "dropping a registration deregisters its callback"]
pub struct CancellationRegistration {
    state: Option<Arc<State>>,
    key: usize,
}

impl CancellationRegistration {
    fn inert() -> Self {
        Self { state: None, key: 0 }
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            // Already gone if the callback ran.
            let callback = state.callbacks.lock().try_remove(self.key);
            drop(callback);
        }
    }
}

impl fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("active", &self.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        (calls, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn none_token_is_never_cancelled() {
        let token = CancellationToken::none();
        let (calls, callback) = counting();
        let _registration = token.register(callback);

        assert!(!token.can_be_cancelled());
        assert!(token.throw_if_cancellation_requested().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_run_once_on_request() {
        let source = CancellationSource::new();
        let token = source.token();
        let (calls, callback) = counting();
        let _registration = token.register(callback);

        source.request_cancellation();
        source.request_cancellation();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            token.throw_if_cancellation_requested(),
            Err(Error::OperationCancelled)
        ));
    }

    #[test]
    fn late_registration_runs_immediately() {
        let source = CancellationSource::new();
        source.request_cancellation();

        let (calls, callback) = counting();
        let _registration = source.token().register(callback);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_registration_never_runs() {
        let source = CancellationSource::new();
        let (calls, callback) = counting();

        drop(source.token().register(callback));
        source.request_cancellation();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
