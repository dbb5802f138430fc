//! Reorder buffer for out-of-order completions.

use std::collections::BTreeMap;

/// Holds items completed out of order and releases them in index order.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept the item at `index` and return every item now releasable,
    /// in order. Returns nothing while an earlier index is outstanding.
    pub fn push(&mut self, index: usize, item: T) -> Vec<T> {
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Items waiting on an earlier index.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
