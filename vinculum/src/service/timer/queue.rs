use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::mem;
use std::ptr;
use std::time::Instant;

use tracing::warn;

/// Something the timer queue can ask about cancellation.
pub(crate) trait Cancellable {
    /// Returns `true` if the timer should fire early because its wait was
    /// cancelled.
    fn is_cancelled(&self) -> bool;
}

/// A heap-allocated timer, as it travels from a registering thread to the
/// timer thread.
///
/// The same allocation is reused as an overflow-list link when the heap
/// cannot grow, so queueing a timer never has to allocate.
pub(crate) struct TimerNode<T> {
    /// The time at which the timer fires.
    pub(crate) due: Instant,

    /// The timed operation.
    pub(crate) item: T,

    /// Next node of the overflow list.
    next: Option<Box<TimerNode<T>>>,

    /// Next node of the intake list.
    pub(super) intake_next: *mut TimerNode<T>,
}

// The raw link is only followed by the single owner of the intake list's
// detached chain.
unsafe impl<T: Send> Send for TimerNode<T> {}

impl<T> TimerNode<T> {
    /// Allocates an unlinked node.
    pub(crate) fn new(due: Instant, item: T) -> Box<Self> {
        Box::new(Self {
            due,
            item,
            next: None,
            intake_next: ptr::null_mut(),
        })
    }
}

/// An entry in the timer heap.
///
/// Entries compare by due time only, in **reverse**, so that a
/// `BinaryHeap<TimerEntry<T>>` pops the earliest due time first.
struct TimerEntry<T> {
    due: Instant,
    item: T,
}

impl<T> Eq for TimerEntry<T> {}

impl<T> PartialEq for TimerEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due.eq(&other.due)
    }
}

impl<T> Ord for TimerEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.due.cmp(&self.due)
    }
}

impl<T> PartialOrd for TimerEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The set of armed timers, owned by the timer thread.
///
/// Timers live in a min-heap. When the heap cannot reserve room for one more
/// entry, the timer's own node is linked into an overflow list kept sorted by
/// due time, after every node with an equal due time. Every timer is in
/// exactly one of the two containers, and draining merges both.
///
/// No operation can fail.
pub(crate) struct TimerQueue<T> {
    heap: BinaryHeap<TimerEntry<T>>,
    overflow: Option<Box<TimerNode<T>>>,
    overflow_len: usize,

    /// Heap size past which reservations are treated as failed.
    #[cfg(test)]
    heap_limit: Option<usize>,
}

impl<T: Cancellable> TimerQueue<T> {
    /// Creates a queue whose heap can hold `capacity` timers without
    /// reallocating.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            overflow: None,
            overflow_len: 0,
            #[cfg(test)]
            heap_limit: None,
        }
    }

    /// Returns `true` if no timer is armed.
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty() && self.overflow.is_none()
    }

    /// Returns the number of armed timers.
    pub(crate) fn len(&self) -> usize {
        self.heap.len() + self.overflow_len
    }

    /// Returns the earliest due time, or `None` if no timer is armed.
    pub(crate) fn earliest_due_time(&self) -> Option<Instant> {
        let heap = self.heap.peek().map(|entry| entry.due);
        let overflow = self.overflow.as_ref().map(|node| node.due);

        match (heap, overflow) {
            (Some(heap), Some(overflow)) => Some(heap.min(overflow)),
            (heap, overflow) => heap.or(overflow),
        }
    }

    /// Arms a timer.
    pub(crate) fn enqueue(&mut self, node: Box<TimerNode<T>>) {
        if self.reserve_heap_slot() {
            let TimerNode { due, item, .. } = *node;
            self.heap.push(TimerEntry { due, item });
            return;
        }

        warn!(
            armed = self.len(),
            "timer heap could not grow; falling back to the overflow list"
        );

        self.link_overflow(node);
    }

    /// Hands every timer due at or before `now` to `sink`, earliest first.
    pub(crate) fn dequeue_due(&mut self, now: Instant, mut sink: impl FnMut(T)) {
        loop {
            let heap_due = self.heap.peek().map(|entry| entry.due);
            let overflow_due = self.overflow.as_ref().map(|node| node.due);

            let from_overflow = match (heap_due, overflow_due) {
                (Some(heap), Some(overflow)) => overflow < heap,
                (None, Some(_)) => true,
                (_, None) => false,
            };

            if from_overflow {
                match self.overflow.take() {
                    Some(mut node) if node.due <= now => {
                        self.overflow = node.next.take();
                        self.overflow_len -= 1;
                        sink(node.item);
                    }
                    head => {
                        self.overflow = head;
                        return;
                    }
                }
            } else {
                match self.heap.peek() {
                    Some(entry) if entry.due <= now => {}
                    _ => return,
                }

                if let Some(entry) = self.heap.pop() {
                    sink(entry.item);
                }
            }
        }
    }

    /// Hands every cancelled timer to `sink`, regardless of its due time.
    ///
    /// The heap is partitioned in place with cancelled entries moved to the
    /// back, then rebuilt from the survivors in linear time.
    pub(crate) fn remove_cancelled(&mut self, mut sink: impl FnMut(T)) {
        let mut entries = mem::take(&mut self.heap).into_vec();
        let mut kept = 0;

        for index in 0..entries.len() {
            if !entries[index].item.is_cancelled() {
                entries.swap(kept, index);
                kept += 1;
            }
        }

        for entry in entries.drain(kept..) {
            sink(entry.item);
        }

        self.heap = BinaryHeap::from(entries);

        let mut rest = self.overflow.take();
        let mut tail = &mut self.overflow;

        while let Some(mut node) = rest {
            rest = node.next.take();

            if node.item.is_cancelled() {
                self.overflow_len -= 1;
                sink(node.item);
            } else {
                tail = &mut tail.insert(node).next;
            }
        }
    }

    /// Hands every remaining timer to `sink`, in no particular order.
    pub(crate) fn drain(&mut self, mut sink: impl FnMut(T)) {
        for entry in mem::take(&mut self.heap).into_vec() {
            sink(entry.item);
        }

        let mut rest = self.overflow.take();
        self.overflow_len = 0;

        while let Some(mut node) = rest {
            rest = node.next.take();
            sink(node.item);
        }
    }

    fn reserve_heap_slot(&mut self) -> bool {
        #[cfg(test)]
        if self.heap_limit.is_some_and(|limit| self.heap.len() >= limit) {
            return false;
        }

        self.heap.try_reserve(1).is_ok()
    }

    /// Links `node` after every overflow node due no later than it.
    fn link_overflow(&mut self, mut node: Box<TimerNode<T>>) {
        let mut cursor = &mut self.overflow;

        while cursor.as_ref().is_some_and(|next| next.due <= node.due) {
            if let Some(next) = cursor {
                cursor = &mut next.next;
            }
        }

        node.next = cursor.take();
        *cursor = Some(node);
        self.overflow_len += 1;
    }

    #[cfg(test)]
    fn limit_heap(&mut self, limit: usize) {
        self.heap_limit = Some(limit);
    }
}

impl<T> Drop for TimerQueue<T> {
    fn drop(&mut self) {
        // Unlink iteratively; a long overflow list would otherwise recurse.
        let mut rest = self.overflow.take();

        while let Some(mut node) = rest {
            rest = node.next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Armed {
        id: usize,
        cancelled: bool,
    }

    impl Cancellable for Armed {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    fn node(base: Instant, millis: u64, id: usize, cancelled: bool) -> Box<TimerNode<Armed>> {
        TimerNode::new(base + Duration::from_millis(millis), Armed { id, cancelled })
    }

    fn drain_all(queue: &mut TimerQueue<Armed>, far: Instant) -> Vec<usize> {
        let mut fired = Vec::new();
        queue.dequeue_due(far, |armed| fired.push(armed.id));
        fired
    }

    #[test]
    fn empty_queue_has_no_due_time() {
        let queue = TimerQueue::<Armed>::with_capacity(0);

        assert!(queue.is_empty());
        assert_eq!(queue.earliest_due_time(), None);
    }

    #[test]
    fn dequeue_stops_at_now() {
        let base = Instant::now();
        let mut queue = TimerQueue::with_capacity(4);
        queue.enqueue(node(base, 30, 3, false));
        queue.enqueue(node(base, 10, 1, false));
        queue.enqueue(node(base, 20, 2, false));

        let mut fired = Vec::new();
        queue.dequeue_due(base + Duration::from_millis(20), |armed| fired.push(armed.id));

        assert_eq!(fired, [1, 2]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.earliest_due_time(), Some(base + Duration::from_millis(30)));
    }

    #[test]
    fn overflow_keeps_insertion_order_for_equal_due_times() {
        let base = Instant::now();
        let mut queue = TimerQueue::with_capacity(0);
        queue.limit_heap(0);

        queue.enqueue(node(base, 10, 1, false));
        queue.enqueue(node(base, 5, 0, false));
        queue.enqueue(node(base, 10, 2, false));
        queue.enqueue(node(base, 10, 3, false));

        assert_eq!(queue.len(), 4);
        assert_eq!(drain_all(&mut queue, base + Duration::from_secs(1)), [0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_timers_leave_both_containers() {
        let base = Instant::now();
        let mut queue = TimerQueue::with_capacity(0);
        queue.limit_heap(2);

        queue.enqueue(node(base, 40, 0, true));
        queue.enqueue(node(base, 10, 1, false));
        queue.enqueue(node(base, 30, 2, true));
        queue.enqueue(node(base, 20, 3, false));

        let mut removed = Vec::new();
        queue.remove_cancelled(|armed| removed.push(armed.id));
        removed.sort_unstable();

        assert_eq!(removed, [0, 2]);
        assert_eq!(queue.len(), 2);
        assert_eq!(drain_all(&mut queue, base + Duration::from_secs(1)), [1, 3]);
    }

    proptest! {
        #[test]
        fn drains_in_due_order_across_heap_and_overflow(
            delays in prop::collection::vec(0u64..50, 0..64),
            limit in 0usize..16,
        ) {
            let base = Instant::now();
            let mut queue = TimerQueue::with_capacity(0);
            queue.limit_heap(limit);

            for (id, delay) in delays.iter().enumerate() {
                queue.enqueue(node(base, *delay, id, false));
            }

            prop_assert_eq!(queue.len(), delays.len());

            let expected_first = delays.iter().min().map(|delay| base + Duration::from_millis(*delay));
            prop_assert_eq!(queue.earliest_due_time(), expected_first);

            let mut due = Vec::new();
            queue.dequeue_due(base + Duration::from_secs(1), |armed| due.push(delays[armed.id]));

            prop_assert_eq!(due.len(), delays.len());
            prop_assert!(due.windows(2).all(|pair| pair[0] <= pair[1]), "drain order: {:?}", due);
            prop_assert!(queue.is_empty());
        }

        #[test]
        fn sweep_removes_exactly_the_cancelled(
            timers in prop::collection::vec((0u64..50, any::<bool>()), 0..64),
            limit in 0usize..16,
        ) {
            let base = Instant::now();
            let mut queue = TimerQueue::with_capacity(0);
            queue.limit_heap(limit);

            for (id, (delay, cancelled)) in timers.iter().enumerate() {
                queue.enqueue(node(base, *delay, id, *cancelled));
            }

            let mut removed = Vec::new();
            queue.remove_cancelled(|armed| removed.push(armed.id));
            removed.sort_unstable();

            let expected: Vec<usize> = timers
                .iter()
                .enumerate()
                .filter(|(_, (_, cancelled))| *cancelled)
                .map(|(id, _)| id)
                .collect();

            prop_assert_eq!(removed, expected);
            prop_assert_eq!(queue.len(), timers.iter().filter(|(_, cancelled)| !cancelled).count());

            let mut due = Vec::new();
            queue.dequeue_due(base + Duration::from_secs(1), |armed| due.push(timers[armed.id].0));
            prop_assert!(due.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}
