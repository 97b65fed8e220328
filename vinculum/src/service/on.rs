use super::DispatchService;
use crate::runtime::Task;

/// Returns a task that moves onto a worker of `service` before running
/// `task`.
///
/// # Examples
///
/// ```rust,ignore
/// let on_worker = schedule_on(&service, Task::from_future(async { expensive() }));
/// ```
pub fn schedule_on<T: Send + 'static>(service: &DispatchService, task: Task<T>) -> Task<T> {
    let service = service.clone();

    Task::new(async move {
        service.schedule().await;
        task.await
    })
}

/// Returns a task that runs `task`, then moves onto a worker of `service`
/// before handing its result to the awaiting party.
pub fn resume_on<T: Send + 'static>(service: &DispatchService, task: Task<T>) -> Task<T> {
    let service = service.clone();

    Task::new(async move {
        let outcome = task.await;
        service.schedule().await;
        outcome
    })
}
