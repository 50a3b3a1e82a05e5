use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use sentiment_middleware::transport::PARTITION_HEADER;
use sentiment_middleware::Transport;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::aggregator::SentimentResult;
use crate::error::PublishError;

/// Wire format of a published aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentMessage {
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub avg_sentiment: f64,
}

impl SentimentMessage {
    pub fn from_result(result: &SentimentResult) -> Result<Self, PublishError> {
        if !result.average_score.is_finite() {
            return Err(PublishError::NonFiniteScore(result.average_score));
        }
        Ok(Self {
            time: result.timestamp.timestamp_millis(),
            avg_sentiment: result.average_score,
        })
    }

    pub fn encode(&self) -> Result<Bytes, PublishError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// Hands aggregates to the outbound topic on a fixed partition
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    topic: String,
    partition: u32,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>, partition: u32) -> Self {
        Self {
            transport,
            topic: topic.into(),
            partition,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, result: &SentimentResult) -> Result<(), PublishError> {
        let msg = SentimentMessage::from_result(result)?;
        let payload = msg.encode()?;

        let mut headers = HashMap::with_capacity(1);
        headers.insert(PARTITION_HEADER.to_string(), self.partition.to_string());

        self.transport
            .publish_with_headers(&self.topic, payload, headers)
            .await?;

        trace!(topic = %self.topic, time = msg.time, avg_sentiment = msg.avg_sentiment, "Published aggregate");
        Ok(())
    }
}
