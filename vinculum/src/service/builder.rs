use super::DispatchService;

/// Default name of the timer thread.
const DEFAULT_TIMER_THREAD_NAME: &str = "vinculum-timer";

/// Default number of timers the timer heap holds before it has to grow.
const DEFAULT_TIMER_CAPACITY: usize = 64;

/// Builder for configuring and creating a dispatch service.
///
/// # Examples
///
/// ```rust
/// use vinculum::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .timer_thread_name("io-timers")
///     .timer_capacity(1024)
///     .build();
///
/// assert!(!service.is_stop_requested());
/// ```
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    /// Name given to the timer thread.
    timer_thread_name: String,

    /// Initial capacity of the timer heap.
    timer_capacity: usize,
}

impl ServiceBuilder {
    /// Creates a new `ServiceBuilder` with default configuration.
    pub fn new() -> Self {
        Self {
            timer_thread_name: DEFAULT_TIMER_THREAD_NAME.to_owned(),
            timer_capacity: DEFAULT_TIMER_CAPACITY,
        }
    }

    /// Sets the name of the timer thread.
    pub fn timer_thread_name(mut self, name: impl Into<String>) -> Self {
        self.timer_thread_name = name.into();
        self
    }

    /// Sets how many timers the timer heap can hold before it has to grow.
    ///
    /// The room is reserved when the timer thread starts, so that the
    /// allocation-free overflow path is only taken under real memory
    /// pressure.
    pub fn timer_capacity(mut self, capacity: usize) -> Self {
        self.timer_capacity = capacity;
        self
    }

    /// Builds the service with the configured options.
    ///
    /// The timer thread is not started until the first timed wait.
    pub fn build(self) -> DispatchService {
        DispatchService::with_config(self.timer_thread_name, self.timer_capacity)
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
