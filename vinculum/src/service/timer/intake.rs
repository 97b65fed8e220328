use super::queue::TimerNode;

use crossbeam_utils::Backoff;

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Lock-free list of newly armed timers.
///
/// Any thread may push; the timer thread detaches the whole list at once.
/// Nodes come out most recent first.
pub(crate) struct IntakeList<T> {
    head: AtomicPtr<TimerNode<T>>,
    _owns: PhantomData<Box<TimerNode<T>>>,
}

unsafe impl<T: Send> Send for IntakeList<T> {}
unsafe impl<T: Send> Sync for IntakeList<T> {}

impl<T> IntakeList<T> {
    /// Creates an empty list.
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            _owns: PhantomData,
        }
    }

    /// Pushes a node and returns `true` if the list was empty.
    pub(crate) fn push(&self, node: Box<TimerNode<T>>) -> bool {
        let node = Box::into_raw(node);
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            // SAFETY: the node is not shared until the exchange succeeds.
            unsafe { (*node).intake_next = head };

            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return head.is_null(),
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Detaches every node pushed so far.
    pub(crate) fn take_all(&self) -> Drain<T> {
        Drain {
            next: self.head.swap(ptr::null_mut(), Ordering::Acquire),
            _owns: PhantomData,
        }
    }
}

impl<T> Drop for IntakeList<T> {
    fn drop(&mut self) {
        drop(self.take_all());
    }
}

/// Nodes detached from an [`IntakeList`]. Undelivered nodes are freed on
/// drop.
pub(crate) struct Drain<T> {
    next: *mut TimerNode<T>,
    _owns: PhantomData<Box<TimerNode<T>>>,
}

impl<T> Iterator for Drain<T> {
    type Item = Box<TimerNode<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }

        // SAFETY: every pointer in a detached chain came from
        // `Box::into_raw` and is owned by this drain alone.
        let mut node = unsafe { Box::from_raw(self.next) };
        self.next = node.intake_next;
        node.intake_next = ptr::null_mut();

        Some(node)
    }
}

impl<T> Drop for Drain<T> {
    fn drop(&mut self) {
        for _ in self.by_ref() {}
    }
}
