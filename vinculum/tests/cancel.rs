use vinculum::Error;
use vinculum::cancel::{CancellationSource, CancellationToken};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_token_observes_source() {
    let source = CancellationSource::new();
    let token = source.token();

    assert!(token.can_be_cancelled());
    assert!(!token.is_cancellation_requested());
    assert!(token.throw_if_cancellation_requested().is_ok());

    source.request_cancellation();

    assert!(source.is_cancellation_requested());
    assert!(token.clone().is_cancellation_requested());
    assert!(matches!(
        token.throw_if_cancellation_requested(),
        Err(Error::OperationCancelled)
    ));
}

#[test]
fn test_default_token_cannot_be_cancelled() {
    let token = CancellationToken::default();

    assert!(!token.can_be_cancelled());
    assert!(!token.is_cancellation_requested());
}

#[test]
fn test_callbacks_run_once_across_threads() {
    let source = CancellationSource::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let registrations: Vec<_> = (0..8)
        .map(|_| {
            let calls = calls.clone();
            source.token().register(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    let requesters: Vec<_> = (0..4)
        .map(|_| {
            let source = source.clone();
            thread::spawn(move || source.request_cancellation())
        })
        .collect();

    for requester in requesters {
        requester.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 8, "Each callback should run exactly once");
    drop(registrations);
}
