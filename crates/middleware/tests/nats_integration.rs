//! Integration tests for NATS transport
//!
//! Run with: cargo test -p sentiment-middleware --test nats_integration -- --ignored
//! Requires: docker run -p 4222:4222 nats:latest

use std::collections::HashMap;

use bytes::Bytes;
use sentiment_middleware::{NatsTransport, TopicNames, Transport};

#[tokio::test]
#[ignore]
async fn test_nats_publish_subscribe_roundtrip() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    let topics = TopicNames::new("it");

    // Subscribe first
    let mut sub = transport
        .subscribe(topics.inbound())
        .await
        .expect("Failed to subscribe");

    transport
        .publish(topics.inbound(), Bytes::from(r#"{"text":"hello"}"#))
        .await
        .expect("Failed to publish");

    let msg = sub.next().await.expect("Failed to receive");
    assert_eq!(msg.payload, Bytes::from(r#"{"text":"hello"}"#));
    sub.unsubscribe().await.expect("Failed to unsubscribe");
}

#[tokio::test]
#[ignore]
async fn test_nats_publish_with_partition_header() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    let topics = TopicNames::new("it");
    let mut sub = transport
        .subscribe(topics.outbound())
        .await
        .expect("Failed to subscribe");

    let mut headers = HashMap::new();
    headers.insert("partition".to_string(), "0".to_string());

    transport
        .publish_with_headers(topics.outbound(), Bytes::from("{}"), headers)
        .await
        .expect("Failed to publish");

    let msg = sub.next().await.expect("Failed to receive");
    assert_eq!(msg.partition(), Some(0));
}
