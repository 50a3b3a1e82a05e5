use crate::window::{SampledBatch, SlidingWindow};

/// What a single sampling tick decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot should go to the aggregator
    Forward(SampledBatch),
    /// Nothing has been accumulated yet
    Empty,
    /// Window unchanged since the last forwarded batch and skipping is enabled
    Unchanged,
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Forward(_) => "forwarded",
            TickOutcome::Empty => "empty",
            TickOutcome::Unchanged => "unchanged",
        }
    }
}

/// Tick gate between the window and the aggregator.
///
/// By default every tick with a non-empty window forwards the whole window
/// again, even if no message arrived since the previous tick, so
/// consecutive batches overlap. `skip_unchanged` turns that off.
#[derive(Debug, Default)]
pub struct Sampler {
    skip_unchanged: bool,
    last_forwarded: Option<u64>,
}

impl Sampler {
    pub fn new(skip_unchanged: bool) -> Self {
        Self {
            skip_unchanged,
            last_forwarded: None,
        }
    }

    pub fn sample(&mut self, window: &SlidingWindow) -> TickOutcome {
        if window.is_empty() {
            return TickOutcome::Empty;
        }
        if self.skip_unchanged && self.last_forwarded == Some(window.generation()) {
            return TickOutcome::Unchanged;
        }
        let batch = window.snapshot();
        self.last_forwarded = Some(batch.generation());
        TickOutcome::Forward(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_is_not_forwarded() {
        let mut sampler = Sampler::new(false);
        let window = SlidingWindow::new(20);
        assert_eq!(sampler.sample(&window), TickOutcome::Empty);
    }

    #[test]
    fn test_forwards_snapshot() {
        let mut sampler = Sampler::new(false);
        let mut window = SlidingWindow::new(20);
        window.accumulate("hi yo".into());
        window.accumulate("plain text".into());

        match sampler.sample(&window) {
            TickOutcome::Forward(batch) => assert_eq!(batch.items(), ["hi yo", "plain text"]),
            other => panic!("expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn test_unchanged_window_is_resent_by_default() {
        let mut sampler = Sampler::new(false);
        let mut window = SlidingWindow::new(20);
        window.accumulate("a".into());

        let first = sampler.sample(&window);
        let second = sampler.sample(&window);
        assert!(matches!(first, TickOutcome::Forward(_)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_skip_unchanged() {
        let mut sampler = Sampler::new(true);
        let mut window = SlidingWindow::new(20);
        window.accumulate("a".into());

        assert!(matches!(sampler.sample(&window), TickOutcome::Forward(_)));
        assert_eq!(sampler.sample(&window), TickOutcome::Unchanged);

        window.accumulate("b".into());
        assert!(matches!(sampler.sample(&window), TickOutcome::Forward(_)));
    }

    #[test]
    fn test_skip_unchanged_sees_duplicate_text_as_change() {
        let mut sampler = Sampler::new(true);
        let mut window = SlidingWindow::new(1);
        window.accumulate("same".into());
        sampler.sample(&window);
        window.accumulate("same".into());
        assert!(matches!(sampler.sample(&window), TickOutcome::Forward(_)));
    }

    #[test]
    fn test_labels() {
        assert_eq!(TickOutcome::Empty.label(), "empty");
        assert_eq!(TickOutcome::Unchanged.label(), "unchanged");
        assert_eq!(
            TickOutcome::Forward(SampledBatch::new(vec![], 0)).label(),
            "forwarded"
        );
    }
}
