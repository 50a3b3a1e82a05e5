//! The relay worker: owns the window and serializes message delivery and
//! sampling ticks on a single task.
//!
//! Scoring runs on detached snapshots in spawned tasks, so a slow
//! sentiment call never delays ingest or the next tick. Overlapping batches
//! may publish out of tick order; each result carries its own timestamp.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sentiment_middleware::Subscription;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::aggregator::{Aggregator, SentimentResult};
use crate::config::Config;
use crate::error::IngestError;
use crate::ingest::decode_text;
use crate::metrics;
use crate::publisher::Publisher;
use crate::sampler::{Sampler, TickOutcome};
use crate::sanitize::sanitize;
use crate::window::{SampledBatch, SlidingWindow};
use crate::Result;

const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window_capacity: usize,
    pub sample_interval: Duration,
    pub skip_unchanged: bool,
    pub shutdown_grace: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            window_capacity: config.window_capacity,
            sample_interval: config.sample_interval,
            skip_unchanged: config.skip_unchanged,
            shutdown_grace: config.shutdown_grace,
        }
    }
}

/// How one sampled batch ended
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Published(SentimentResult),
    /// Empty batch, nothing to score
    Skipped,
    AggregationFailed(&'static str),
    PublishFailed,
}

pub struct Pipeline {
    window: SlidingWindow,
    sampler: Sampler,
    aggregator: Aggregator,
    publisher: Publisher,
    settings: PipelineSettings,
    subscribed: Arc<AtomicBool>,
    /// Unix timestamp (seconds) of last message received
    last_message_epoch_secs: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, aggregator: Aggregator, publisher: Publisher) -> Self {
        Self {
            window: SlidingWindow::new(settings.window_capacity),
            sampler: Sampler::new(settings.skip_unchanged),
            aggregator,
            publisher,
            settings,
            subscribed: Arc::new(AtomicBool::new(false)),
            last_message_epoch_secs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a handle to the subscribed status
    pub fn subscribed_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.subscribed)
    }

    /// Returns a handle to the last message timestamp
    pub fn last_message_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.last_message_epoch_secs)
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Decode, sanitize and accumulate one inbound payload.
    ///
    /// A payload that cannot be decoded leaves the window untouched.
    pub fn handle_message(&mut self, payload: &[u8]) -> std::result::Result<(), IngestError> {
        let text = decode_text(payload).inspect_err(|_| metrics::inc_rejected())?;
        let clean = sanitize(&text);
        trace!(raw = %text, clean = %clean, "Accumulating message");

        let len = self.window.accumulate(clean).len();
        metrics::inc_received();
        metrics::set_window_len(len);
        self.update_last_message_time();
        Ok(())
    }

    /// Run one sampling tick. Returns the batch to score, if any.
    pub fn on_tick(&mut self) -> Option<SampledBatch> {
        let outcome = self.sampler.sample(&self.window);
        metrics::inc_tick(outcome.label());
        match outcome {
            TickOutcome::Forward(batch) => {
                debug!(items = batch.len(), generation = batch.generation(), "Tick forwarding batch");
                Some(batch)
            }
            other => {
                trace!(outcome = other.label(), "Tick skipped");
                None
            }
        }
    }

    fn update_last_message_time(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last_message_epoch_secs.store(now, Ordering::SeqCst);
    }

    /// Run until cancelled or the inbound subscription closes.
    ///
    /// On exit the subscription is released and in-flight batches get
    /// `shutdown_grace` to finish; anything still running is aborted and its
    /// result never published.
    pub async fn run(
        mut self,
        mut subscription: Box<dyn Subscription>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let period = self.settings.sample_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = interval_at(Instant::now() + STATS_INTERVAL, STATS_INTERVAL);

        let mut in_flight: JoinSet<BatchOutcome> = JoinSet::new();
        self.subscribed.store(true, Ordering::SeqCst);
        info!(
            topic = %self.publisher.topic(),
            capacity = self.window.capacity(),
            interval_ms = period.as_millis() as u64,
            skip_unchanged = self.settings.skip_unchanged,
            "Pipeline running"
        );

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
                msg = subscription.next() => {
                    match msg {
                        Ok(msg) => {
                            if let Err(e) = self.handle_message(&msg.payload) {
                                warn!(error = %e, subject = %msg.subject, "Dropping undecodable message");
                            }
                        }
                        Err(e) if e.is_closed() => {
                            error!(error = %e, "Inbound subscription closed - exiting to trigger restart");
                            break Err(e.into());
                        }
                        Err(e) => {
                            warn!(error = %e, "Inbound transport error");
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Some(batch) = self.on_tick() {
                        let aggregator = self.aggregator.clone();
                        let publisher = self.publisher.clone();
                        in_flight.spawn(async move {
                            process_batch(&aggregator, &publisher, batch).await
                        });
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Batch task panicked");
                    }
                }
                _ = stats.tick() => {
                    info!(
                        received = metrics::received_total(),
                        rejected = metrics::rejected_total(),
                        published = metrics::published_total(),
                        window = self.window.len(),
                        in_flight = in_flight.len(),
                        "Relay stats"
                    );
                }
            }
        };

        self.subscribed.store(false, Ordering::SeqCst);
        if let Err(e) = subscription.unsubscribe().await {
            warn!(error = %e, "Failed to unsubscribe");
        }

        if !in_flight.is_empty() {
            let pending = in_flight.len();
            let drain = async {
                while in_flight.join_next().await.is_some() {}
            };
            if tokio::time::timeout(self.settings.shutdown_grace, drain).await.is_err() {
                warn!(
                    pending,
                    abandoned = in_flight.len(),
                    "Abandoning in-flight batches"
                );
                in_flight.abort_all();
            }
        }

        info!("Pipeline stopped");
        result
    }
}

/// Score one batch and publish the result. Every failure is logged here
/// and stays local to this batch.
pub async fn process_batch(
    aggregator: &Aggregator,
    publisher: &Publisher,
    batch: SampledBatch,
) -> BatchOutcome {
    let result = match aggregator.aggregate(&batch).await {
        Ok(Some(result)) => result,
        Ok(None) => return BatchOutcome::Skipped,
        Err(e) => {
            metrics::inc_aggregation_failure(e.kind());
            warn!(error = %e, kind = e.kind(), items = batch.len(), "Batch dropped");
            return BatchOutcome::AggregationFailed(e.kind());
        }
    };

    match publisher.publish(&result).await {
        Ok(()) => {
            metrics::record_published(result.average_score);
            debug!(
                topic = %publisher.topic(),
                avg_sentiment = result.average_score,
                items = result.sample_size,
                "Aggregate published"
            );
            BatchOutcome::Published(result)
        }
        Err(e) => {
            metrics::inc_publish_failure();
            error!(error = %e, topic = %publisher.topic(), "Failed to publish aggregate");
            BatchOutcome::PublishFailed
        }
    }
}
