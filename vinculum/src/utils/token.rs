use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static TOKEN: usize = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Returns a token unique to the calling thread. Never `0`.
pub(crate) fn thread_token() -> usize {
    TOKEN.with(|token| *token)
}
