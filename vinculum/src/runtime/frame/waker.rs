use super::Frame;

use std::sync::Arc;
use std::task::Wake;

/// Waking an idle frame resumes it on the waking thread; waking a frame that
/// is being polled makes the polling thread poll it again.
impl<T: Send + 'static> Wake for Frame<T> {
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.resume();
    }
}
