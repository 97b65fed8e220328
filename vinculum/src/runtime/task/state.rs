/// Lifecycle of a task body.
///
/// A body moves forward only: `Created` until its first poll, `Started`
/// while it is suspended somewhere, `Completed` once its outcome is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// The body exists but has never been polled.
    Created,

    /// The body has been polled at least once and has not finished.
    Started,

    /// The outcome is stored and the body has been dropped.
    Completed,
}
