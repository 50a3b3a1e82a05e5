use sentiment_middleware::TransportError;
use thiserror::Error;

/// Fatal startup configuration problems. Raised before any broker connection.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable must be defined")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to write TLS identity: {0}")]
    Io(#[from] std::io::Error),
}

/// A single inbound message that could not be turned into text
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("payload has no string `text` field")]
    MissingText,
}

/// Failure to score one sampled batch. The batch is dropped, never retried.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("sentiment API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed sentiment response: {0}")]
    MalformedResponse(String),

    #[error("sentiment API returned no scores")]
    EmptyResponse,
}

impl AggregationError {
    /// Stable label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AggregationError::UpstreamUnavailable(_) => "upstream_unavailable",
            AggregationError::MalformedResponse(_) => "malformed_response",
            AggregationError::EmptyResponse => "empty_response",
        }
    }
}

/// Failure to hand one result to the outbound topic. The result is dropped.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("average sentiment is not a finite number: {0}")]
    NonFiniteScore(f64),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport rejected message: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
