use hashbrown::HashMap;

/// Reorders results that complete out of order so they can be reported in
/// input order.
pub struct Buffer<T> {
    pending: HashMap<usize, T>,
    next_idx: usize,
}

impl<T> Buffer<T> {
    #[inline]
    pub fn new(start: usize) -> Self {
        Self { pending: HashMap::new(), next_idx: start }
    }

    /// Stores `item` and returns every item that is now next in line.
    #[must_use]
    pub fn add(&mut self, index: usize, item: T) -> Vec<T> {
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next_idx) {
            ready.push(item);
            self.next_idx += 1;
        }

        ready
    }

    /// Drains whatever is left, in index order, skipping gaps.
    #[must_use]
    pub fn flush(&mut self) -> Vec<T> {
        let mut rest: Vec<(usize, T)> = self.pending.drain().collect();
        rest.sort_unstable_by_key(|(idx, _)| *idx);

        if let Some((last, _)) = rest.last() {
            self.next_idx = last + 1;
        }

        rest.into_iter().map(|(_, item)| item).collect()
    }
}
