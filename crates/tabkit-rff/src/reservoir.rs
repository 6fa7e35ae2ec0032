//! Fixed-capacity reservoir sampling.
//!
//! Keeps a uniform random subsample of at most `capacity` items from a stream
//! of unknown length in one pass (Vitter's Algorithm R). The first `capacity`
//! items are kept in arrival order; after that the `n`-th item replaces a
//! random slot with probability `capacity / n`.

use crate::rng::TauswortheHybrid;

/// Bounded uniform sample of a stream.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    items: Vec<T>,
    seen: u64,
}

impl<T> ReservoirSampler<T> {
    /// Create an empty reservoir.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(1024)),
            seen: 0,
        }
    }

    /// Offer one stream item.
    pub fn sample(&mut self, rng: &mut TauswortheHybrid, item: T) {
        if let Some(slot) = self.next_slot(rng) {
            self.place(slot, item);
        }
    }

    /// Offer one stream item, materializing it only if it will be kept.
    ///
    /// The random decision is made before `make` runs, so the generator
    /// stream does not depend on whether materialization is cheap or not.
    pub fn try_sample_with<E, F>(&mut self, rng: &mut TauswortheHybrid, make: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(slot) = self.next_slot(rng) {
            self.place(slot, make()?);
        }
        Ok(())
    }

    /// Count one offered item and pick the slot it goes to, if any.
    fn next_slot(&mut self, rng: &mut TauswortheHybrid) -> Option<usize> {
        self.seen += 1;
        if self.items.len() < self.capacity {
            return Some(self.items.len());
        }
        let slot = rng.next_index(self.seen) as usize;
        (slot < self.capacity).then_some(slot)
    }

    fn place(&mut self, slot: usize, item: T) {
        if slot == self.items.len() {
            self.items.push(item);
        } else {
            self.items[slot] = item;
        }
    }

    /// Maximum number of kept items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items offered so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Number of kept items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been kept.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Kept items.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the reservoir, returning the kept items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
