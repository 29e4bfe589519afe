//! Array-backed binary min-heap keyed by `f64` priority.
//!
//! Lower priority values are served first. An entry's priority is fixed at
//! insertion; [`PriorityQueue::reprioritize`] resifts internally, so there
//! is no way to desynchronize the heap by mutating a key out of band.
//! Duplicate items are allowed and occupy separate slots; order among equal
//! priorities is unspecified.
//!
//! Heap invariant: `priority(heap[i]) <= priority(heap[2i+1])` and
//! `<= priority(heap[2i+2])` for every valid index.

#[derive(Debug, Clone)]
struct Entry<T> {
    priority: f64,
    item: T,
}

/// Binary min-heap priority queue.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    heap: Vec<Entry<T>>,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Insert an item at the given priority. O(log n). Duplicates are not
    /// detected; inserting the same item twice creates two slots.
    pub fn put(&mut self, item: T, priority: f64) {
        self.heap.push(Entry { priority, item });
        self.sift_up(self.heap.len() - 1);
    }

    /// Peek the minimum-priority item. O(1). `None` on empty, never panics.
    #[must_use]
    pub fn peek_min(&self) -> Option<(&T, f64)> {
        self.heap.first().map(|e| (&e.item, e.priority))
    }

    /// Remove and return the minimum-priority item. O(log n).
    pub fn delete_min(&mut self) -> Option<(T, f64)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let entry = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((entry.item, entry.priority))
    }

    /// Remove the first item matching `pred`: linear scan, swap with the
    /// last slot, then resift. Removes at most one occurrence. Returns the
    /// removed item, or `None` if nothing matched.
    pub fn delete(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let pos = self.heap.iter().position(|e| pred(&e.item))?;
        let last = self.heap.len() - 1;
        self.heap.swap(pos, last);
        let entry = self.heap.pop()?;
        if pos < self.heap.len() {
            // the element moved into the hole may violate either direction
            self.sift_down(pos);
            self.sift_up(pos);
        }
        Some(entry.item)
    }

    /// Change the priority of the first item matching `pred`, resifting to
    /// restore the invariant. Returns whether a match was found.
    pub fn reprioritize(&mut self, mut pred: impl FnMut(&T) -> bool, priority: f64) -> bool {
        let Some(pos) = self.heap.iter().position(|e| pred(&e.item)) else {
            return false;
        };
        self.heap[pos].priority = priority;
        self.sift_down(pos);
        self.sift_up(pos);
        true
    }

    /// Iterate items in heap order (not priority order).
    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.heap.iter().map(|e| (&e.item, e.priority))
    }

    /// Drain all items in unspecified order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.heap.drain(..).map(|e| e.item)
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].priority < self.heap[parent].priority {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut min = i;
            if left < n && self.heap[left].priority < self.heap[min].priority {
                min = left;
            }
            if right < n && self.heap[right].priority < self.heap[min].priority {
                min = right;
            }
            if min == i {
                break;
            }
            self.heap.swap(i, min);
            i = min;
        }
    }

    #[cfg(test)]
    fn check_invariant(&self) {
        for i in 0..self.heap.len() {
            for child in [2 * i + 1, 2 * i + 2] {
                if child < self.heap.len() {
                    assert!(
                        self.heap[i].priority <= self.heap[child].priority,
                        "heap violation at {i} -> {child}"
                    );
                }
            }
        }
    }
}
