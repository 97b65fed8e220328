use vinculum::cancel::{CancellationSource, CancellationToken};
use vinculum::{DispatchService, Error, ServiceBuilder, Task, sync_wait};

use std::thread;
use std::time::{Duration, Instant};

fn start_worker(service: &DispatchService) -> thread::JoinHandle<u64> {
    let service = service.clone();
    thread::spawn(move || service.process_events())
}

fn sleep_task(service: &DispatchService, delay: Duration, token: CancellationToken) -> Task<Duration> {
    let service = service.clone();

    Task::new(async move {
        let start = Instant::now();
        service.schedule_after(delay, token).await?;
        Ok(start.elapsed())
    })
}

#[test]
fn test_schedule_after_waits() {
    let service = DispatchService::new();
    let worker = start_worker(&service);

    let elapsed = sync_wait(sleep_task(&service, Duration::from_millis(50), CancellationToken::none())).unwrap();

    assert!(
        elapsed >= Duration::from_millis(50),
        "Timed wait should last at least the requested delay, lasted {elapsed:?}"
    );

    service.stop();
    worker.join().unwrap();
}

#[test]
fn test_schedule_after_zero_delay() {
    let service = DispatchService::new();
    let worker = start_worker(&service);

    let elapsed = sync_wait(sleep_task(&service, Duration::ZERO, CancellationToken::none())).unwrap();
    assert!(elapsed < Duration::from_secs(1), "Zero delay should fire promptly");

    service.stop();
    worker.join().unwrap();
}

#[test]
fn test_timers_fire_in_due_order() {
    let service = ServiceBuilder::new().timer_capacity(0).build();
    let worker = start_worker(&service);

    let (sender, receiver) = std::sync::mpsc::channel();
    let waits: Vec<_> = [60_u64, 20, 40]
        .into_iter()
        .map(|millis| {
            let service = service.clone();
            let sender = sender.clone();
            thread::spawn(move || {
                let task = Task::new(async move {
                    service
                        .schedule_after(Duration::from_millis(millis), CancellationToken::none())
                        .await?;
                    let _ = sender.send(millis);
                    Ok(())
                });
                sync_wait(task)
            })
        })
        .collect();

    for wait in waits {
        wait.join().unwrap().unwrap();
    }
    drop(sender);

    let fired: Vec<u64> = receiver.iter().collect();
    assert_eq!(fired, [20, 40, 60]);

    service.stop();
    worker.join().unwrap();
}

#[test]
fn test_pre_cancelled_wait_fails_immediately() {
    let service = DispatchService::new();
    let source = CancellationSource::new();
    source.request_cancellation();

    let start = Instant::now();
    let outcome = sync_wait(sleep_task(&service, Duration::from_secs(30), source.token()));

    assert!(matches!(outcome, Err(Error::OperationCancelled)));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(service.process_pending_events(), 0, "Nothing should have been posted");
}

#[test]
fn test_cancel_pending_wait() {
    let service = DispatchService::new();
    let worker = start_worker(&service);
    let source = CancellationSource::new();

    let canceller = {
        let source = source.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            source.request_cancellation();
        })
    };

    let start = Instant::now();
    let outcome = sync_wait(sleep_task(&service, Duration::from_secs(30), source.token()));

    assert!(
        matches!(outcome, Err(ref error) if error.is_cancelled()),
        "Expected a cancelled wait, got {outcome:?}"
    );
    assert!(start.elapsed() < Duration::from_secs(5), "Cancellation should resume the wait promptly");

    canceller.join().unwrap();
    service.stop();
    worker.join().unwrap();
}

#[test]
fn test_uncancelled_token_with_source_still_fires() {
    let service = DispatchService::new();
    let worker = start_worker(&service);
    let source = CancellationSource::new();

    let elapsed = sync_wait(sleep_task(&service, Duration::from_millis(10), source.token())).unwrap();
    assert!(elapsed >= Duration::from_millis(10));

    source.request_cancellation();

    service.stop();
    worker.join().unwrap();
}

#[test]
fn test_timer_thread_joins_on_drop() {
    let service = DispatchService::new();
    let source = CancellationSource::new();

    let wait = {
        let service = service.clone();
        let token = source.token();
        thread::spawn(move || {
            let task = Task::new(async move { service.schedule_after(Duration::from_secs(60), token).await });
            sync_wait(task)
        })
    };

    thread::sleep(Duration::from_millis(20));
    source.request_cancellation();

    // The cancelled wait is resumed through the event loop.
    while !wait.is_finished() {
        service.process_pending_events();
        thread::yield_now();
    }

    assert!(wait.join().unwrap().unwrap_err().is_cancelled());
    drop(service);
}
