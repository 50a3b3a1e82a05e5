use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentiment_middleware::{now_tsc, CLOCK};
use tracing::{debug, warn};

use crate::error::AggregationError;
use crate::metrics;
use crate::scorer::{ScoreItem, SentimentScorer};
use crate::window::SampledBatch;

/// Mean compound score of one batch, stamped when it was computed
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentResult {
    pub timestamp: DateTime<Utc>,
    pub average_score: f64,
    /// Number of scores the average was taken over
    pub sample_size: usize,
}

/// Scores a sampled batch through the external collaborator and averages it
#[derive(Clone)]
pub struct Aggregator {
    scorer: Arc<dyn SentimentScorer>,
}

impl Aggregator {
    pub fn new(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { scorer }
    }

    /// Returns `Ok(None)` for an empty batch without calling the scorer.
    pub async fn aggregate(
        &self,
        batch: &SampledBatch,
    ) -> Result<Option<SentimentResult>, AggregationError> {
        if batch.is_empty() {
            return Ok(None);
        }

        let start = now_tsc();
        let scores = self.scorer.score(batch.items()).await;
        metrics::observe_scoring_duration(CLOCK.delta(start, now_tsc()).as_secs_f64());
        let scores = scores?;

        if !scores.is_empty() && scores.len() != batch.len() {
            warn!(
                batch = batch.len(),
                scores = scores.len(),
                "Score count does not match batch size, averaging what was returned"
            );
        }

        let average_score = mean_compound(&scores)?;
        debug!(
            generation = batch.generation(),
            items = scores.len(),
            average_score,
            "Batch scored"
        );

        Ok(Some(SentimentResult {
            timestamp: Utc::now(),
            average_score,
            sample_size: scores.len(),
        }))
    }
}

/// Arithmetic mean of the compound scores
pub fn mean_compound(scores: &[ScoreItem]) -> Result<f64, AggregationError> {
    if scores.is_empty() {
        return Err(AggregationError::EmptyResponse);
    }
    let sum: f64 = scores.iter().map(|s| s.compound).sum();
    Ok(sum / scores.len() as f64)
}
