/// A simple slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and returns
/// stable indices that can be reused after removal. Vacant slots are chained
/// through a stack of free indices.
pub(crate) struct Slab<T> {
    /// Storage for items; `None` marks a vacant slot.
    items: Vec<Option<T>>,

    /// Stack of vacant indices that can be reused.
    free: Vec<usize>,

    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value and returns its index.
    ///
    /// A vacant slot is reused when one exists; otherwise the slab grows.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            self.items[index] = Some(item);
            return index;
        }

        self.items.push(Some(item));
        self.items.len() - 1
    }

    /// Removes and returns the value at `index`, if the slot is occupied.
    pub(crate) fn try_remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(item)
    }

    /// Removes every value, in index order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free.clear();
        self.len = 0;

        self.items.drain(..).flatten()
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_slots_are_reused() {
        let mut slab = Slab::new();
        let first = slab.insert("a");
        let second = slab.insert("b");

        assert_eq!(slab.try_remove(first), Some("a"));
        assert_eq!(slab.try_remove(first), None, "a slot is removed once");
        assert_eq!(slab.insert("c"), first);
        assert_eq!(slab.len(), 2);
        assert_eq!(slab.try_remove(second), Some("b"));
    }

    #[test]
    fn drain_empties_the_slab() {
        let mut slab = Slab::new();
        slab.insert(1);
        let middle = slab.insert(2);
        slab.insert(3);
        slab.try_remove(middle);

        let drained: Vec<_> = slab.drain().collect();

        assert_eq!(drained, [1, 3]);
        assert_eq!(slab.len(), 0);
        assert_eq!(slab.try_remove(0), None);
    }
}
