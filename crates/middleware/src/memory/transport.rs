use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::TransportError;
use crate::latency::now_tsc;
use crate::transport::{Subscription, Transport, TransportMessage};

const CHANNEL_BUFFER_SIZE: usize = 1024;

pub struct InMemoryTransport {
    channels: DashMap<String, broadcast::Sender<TransportMessage>>,
    sequence: AtomicU64,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    #[inline]
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn get_or_create_channel(&self, subject: &str) -> broadcast::Sender<TransportMessage> {
        self.channels
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER_SIZE).0)
            .clone()
    }

    /// Number of live subscriptions on a subject
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.channels
            .get(subject)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel for a subject, closing every subscription on it
    pub fn close_subject(&self, subject: &str) {
        self.channels.remove(subject);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemorySubscription {
    rx: broadcast::Receiver<TransportMessage>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        match self.rx.recv().await {
            Ok(msg) => Ok(msg),
            Err(RecvError::Lagged(skipped)) => Err(TransportError::SubscribeFailed(format!(
                "subscriber lagged, {} messages dropped",
                skipped
            ))),
            Err(RecvError::Closed) => Err(TransportError::Closed("channel dropped".to_string())),
        }
    }

    async fn unsubscribe(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.publish_with_headers(subject, payload, HashMap::new())
            .await
    }

    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: HashMap<String, String>,
    ) -> Result<(), TransportError> {
        let tx = self.get_or_create_channel(subject);
        let seq = self.next_sequence();
        let msg = TransportMessage {
            subject: subject.to_string(),
            payload,
            headers,
            timestamp: now_tsc(),
            sequence: Some(seq),
        };
        // No subscribers is not an error, same as core NATS
        let _ = tx.send(msg);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let tx = self.get_or_create_channel(subject);
        let rx = tx.subscribe();
        Ok(Box::new(InMemorySubscription { rx }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("tweets-keyword").await.unwrap();
        transport
            .publish("tweets-keyword", Bytes::from(r#"{"text":"hello"}"#))
            .await
            .unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.subject, "tweets-keyword");
        assert_eq!(msg.payload, Bytes::from(r#"{"text":"hello"}"#));
    }

    #[tokio::test]
    async fn test_sequence_numbers_increment() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("test.seq").await.unwrap();
        transport
            .publish("test.seq", Bytes::from("1"))
            .await
            .unwrap();
        transport
            .publish("test.seq", Bytes::from("2"))
            .await
            .unwrap();
        let msg1 = sub.next().await.unwrap();
        let msg2 = sub.next().await.unwrap();
        assert_eq!(msg1.sequence, Some(0));
        assert_eq!(msg2.sequence, Some(1));
    }

    #[tokio::test]
    async fn test_headers_are_delivered() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("tweets-sentiment").await.unwrap();
        let mut headers = HashMap::new();
        headers.insert("partition".to_string(), "0".to_string());
        transport
            .publish_with_headers("tweets-sentiment", Bytes::from("x"), headers)
            .await
            .unwrap();
        let msg = sub.next().await.unwrap();
        assert_eq!(msg.partition(), Some(0));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let transport = InMemoryTransport::new();
        assert!(transport.publish("nobody", Bytes::from("x")).await.is_ok());
        assert_eq!(transport.subscriber_count("nobody"), 0);
    }

    #[tokio::test]
    async fn test_close_subject_ends_subscription() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("tweets-keyword").await.unwrap();
        assert_eq!(transport.subscriber_count("tweets-keyword"), 1);

        transport.close_subject("tweets-keyword");
        let err = sub.next().await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_is_not_closed() {
        let transport = InMemoryTransport::new();
        let mut sub = transport.subscribe("flood").await.unwrap();
        for i in 0..(CHANNEL_BUFFER_SIZE + 10) {
            transport
                .publish("flood", Bytes::from(i.to_string()))
                .await
                .unwrap();
        }
        let err = sub.next().await.unwrap_err();
        assert!(!err.is_closed());
        // Receiver resumes at the oldest retained message
        assert!(sub.next().await.is_ok());
    }
}
