use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::error::TransportError;

/// Header carrying the logical destination partition
pub const PARTITION_HEADER: &str = "partition";

/// Message envelope with metadata
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub subject: String,
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
    /// TSC timestamp taken when the message was received (see `latency::now_tsc`)
    pub timestamp: u64,
    pub sequence: Option<u64>,
}

impl TransportMessage {
    /// Partition the producer targeted, if it set one
    pub fn partition(&self) -> Option<u32> {
        self.headers
            .get(PARTITION_HEADER)
            .and_then(|p| p.parse().ok())
    }
}

/// Subscription handle for receiving messages
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Receive next message (blocks until available)
    async fn next(&mut self) -> Result<TransportMessage, TransportError>;

    /// Unsubscribe and close
    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError>;
}

/// Transport abstraction for pub/sub messaging
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a message (fire and forget)
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Publish with headers
    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: HashMap<String, String>,
    ) -> Result<(), TransportError>;

    /// Subscribe to a subject
    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError>;
}
