//! Bounded, order-preserving window of recent cleaned text.
//!
//! Owned by the pipeline worker only. Readers get a [`SampledBatch`], a
//! detached copy whose lifetime is independent of the live window.

use std::collections::VecDeque;

/// Upper bound on the up-front allocation; larger windows grow on demand
const PREALLOC_LIMIT: usize = 64;

/// Immutable snapshot of the window taken at a sampling tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledBatch {
    items: Vec<String>,
    /// Window generation the snapshot was taken at
    generation: u64,
}

impl SampledBatch {
    pub fn new(items: Vec<String>, generation: u64) -> Self {
        Self { items, generation }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Sliding window with drop-oldest eviction
#[derive(Debug)]
pub struct SlidingWindow {
    items: VecDeque<String>,
    capacity: usize,
    /// Bumped on every accumulate; lets the sampler detect an unchanged window
    generation: u64,
}

impl SlidingWindow {
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Config rejects that before startup.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be at least 1");
        Self {
            items: VecDeque::with_capacity(capacity.min(PREALLOC_LIMIT)),
            capacity,
            generation: 0,
        }
    }

    /// Append one cleaned item, evicting the oldest beyond capacity.
    ///
    /// Duplicates and empty strings are kept. Returns the window contents
    /// after the append, oldest first.
    pub fn accumulate(&mut self, clean: String) -> &VecDeque<String> {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(clean);
        self.generation += 1;
        &self.items
    }

    /// Copy the current contents out as a batch
    pub fn snapshot(&self) -> SampledBatch {
        SampledBatch::new(self.items.iter().cloned().collect(), self.generation)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(window: &mut SlidingWindow, n: usize) -> Vec<String> {
        let input: Vec<String> = (0..n).map(|i| format!("tweet-{}", i)).collect();
        for item in &input {
            window.accumulate(item.clone());
        }
        input
    }

    #[test]
    fn test_starts_empty() {
        let window = SlidingWindow::new(20);
        assert!(window.is_empty());
        assert!(window.snapshot().is_empty());
        assert_eq!(window.generation(), 0);
    }

    #[test]
    fn test_under_capacity_keeps_everything_in_order() {
        for n in [1, 7, 19, 20] {
            let mut window = SlidingWindow::new(20);
            let input = fill(&mut window, n);
            assert_eq!(window.len(), n);
            assert_eq!(window.snapshot().items(), input.as_slice());
        }
    }

    #[test]
    fn test_over_capacity_keeps_last_items_in_order() {
        for n in [21, 40, 257] {
            let mut window = SlidingWindow::new(20);
            let input = fill(&mut window, n);
            assert_eq!(window.len(), 20);
            assert_eq!(window.snapshot().items(), &input[n - 20..]);
        }
    }

    #[test]
    fn test_accumulate_returns_current_contents() {
        let mut window = SlidingWindow::new(2);
        window.accumulate("a".into());
        window.accumulate("b".into());
        let contents = window.accumulate("c".into());
        assert_eq!(contents.iter().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn test_duplicates_and_empty_strings_are_kept() {
        let mut window = SlidingWindow::new(5);
        window.accumulate("same".into());
        window.accumulate("same".into());
        window.accumulate(String::new());
        window.accumulate("  ".into());
        assert_eq!(window.snapshot().items(), ["same", "same", "", "  "]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut window = SlidingWindow::new(3);
        window.accumulate("a".into());
        let batch = window.snapshot();
        window.accumulate("b".into());
        assert_eq!(batch.items(), ["a"]);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_generation_tracks_every_append() {
        let mut window = SlidingWindow::new(1);
        window.accumulate("a".into());
        let first = window.snapshot();
        window.accumulate("a".into());
        let second = window.snapshot();
        // Same contents, but a new message arrived
        assert_eq!(first.items(), second.items());
        assert_ne!(first.generation(), second.generation());
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut window = SlidingWindow::new(usize::MAX / 2);
        window.accumulate("a".into());
        window.accumulate("b".into());
        assert_eq!(window.capacity(), usize::MAX / 2);
        assert_eq!(window.snapshot().items(), ["a", "b"]);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_capacity_panics() {
        SlidingWindow::new(0);
    }
}
