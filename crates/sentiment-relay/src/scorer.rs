//! External sentiment-scoring collaborator.
//!
//! The HTTP client speaks the Algorithmia algorithm API: the batch is
//! POSTed as a JSON array of strings and the reply wraps per-item scores
//! in a `result` envelope.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::AggregationError;
use crate::Result;

/// One score per input text. Only `compound` is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoreItem {
    pub compound: f64,
}

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Score a batch of texts. The returned order need not match the input.
    async fn score(&self, texts: &[String]) -> std::result::Result<Vec<ScoreItem>, AggregationError>;
}

/// Sentiment scorer backed by a hosted algorithm endpoint
pub struct HttpSentimentScorer {
    http: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpSentimentScorer {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SentimentScorer for HttpSentimentScorer {
    async fn score(&self, texts: &[String]) -> std::result::Result<Vec<ScoreItem>, AggregationError> {
        debug!(url = %self.url, items = texts.len(), "POST sentiment batch");

        let resp = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Simple {}", self.api_key))
            .json(texts)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AggregationError::UpstreamUnavailable(format!(
                        "timed out after {}ms",
                        self.timeout.as_millis()
                    ))
                } else {
                    AggregationError::UpstreamUnavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| AggregationError::UpstreamUnavailable(format!("reading body: {}", e)))?;

        if !status.is_success() {
            let snippet = String::from_utf8_lossy(&body);
            return Err(AggregationError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status,
                snippet.chars().take(200).collect::<String>()
            )));
        }

        parse_scores(&body)
    }
}

/// Decode a response envelope into score items
pub fn parse_scores(body: &[u8]) -> std::result::Result<Vec<ScoreItem>, AggregationError> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| AggregationError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    if let Some(err) = envelope.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(AggregationError::UpstreamUnavailable(message));
    }

    let result = envelope
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| AggregationError::MalformedResponse("missing `result` array".into()))?;

    result
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.get("compound")
                .and_then(Value::as_f64)
                .map(|compound| ScoreItem { compound })
                .ok_or_else(|| {
                    AggregationError::MalformedResponse(format!(
                        "item {} has no numeric `compound`",
                        i
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ALGO_PATH: &str = "/v1/algo/nlp/SocialSentimentAnalysis/0.1.5";

    async fn setup(timeout: Duration) -> (MockServer, HttpSentimentScorer) {
        let server = MockServer::start().await;
        let scorer = HttpSentimentScorer::new(
            format!("{}{}", server.uri(), ALGO_PATH),
            "test-api-key",
            timeout,
        )
        .unwrap();
        (server, scorer)
    }

    fn batch() -> Vec<String> {
        vec!["hi yo".to_string(), "plain text".to_string()]
    }

    #[tokio::test]
    async fn test_score_success() {
        let (server, scorer) = setup(Duration::from_secs(5)).await;

        Mock::given(method("POST"))
            .and(path(ALGO_PATH))
            .and(header("Authorization", "Simple test-api-key"))
            .and(body_json(json!(["hi yo", "plain text"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"compound": 0.5, "negative": 0.0, "neutral": 0.4, "positive": 0.6, "sentence": "hi yo"},
                    {"compound": -0.25, "negative": 0.3, "neutral": 0.7, "positive": 0.0, "sentence": "plain text"}
                ],
                "metadata": {"content_type": "json", "duration": 0.01}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scores = scorer.score(&batch()).await.unwrap();
        assert_eq!(
            scores,
            vec![ScoreItem { compound: 0.5 }, ScoreItem { compound: -0.25 }]
        );
    }

    #[tokio::test]
    async fn test_error_envelope_is_upstream_unavailable() {
        let (server, scorer) = setup(Duration::from_secs(5)).await;

        Mock::given(method("POST"))
            .and(path(ALGO_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"message": "algorithm raised an exception"}
            })))
            .mount(&server)
            .await;

        match scorer.score(&batch()).await {
            Err(AggregationError::UpstreamUnavailable(msg)) => {
                assert_eq!(msg, "algorithm raised an exception")
            }
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_upstream_unavailable() {
        let (server, scorer) = setup(Duration::from_secs(5)).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad api key"))
            .mount(&server)
            .await;

        match scorer.score(&batch()).await {
            Err(AggregationError::UpstreamUnavailable(msg)) => {
                assert!(msg.contains("401"), "{}", msg);
                assert!(msg.contains("bad api key"), "{}", msg);
            }
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let (server, scorer) = setup(Duration::from_millis(50)).await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": [{"compound": 0.1}]}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = scorer.score(&batch()).await.unwrap_err();
        assert!(matches!(err, AggregationError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_unavailable() {
        // Grab a free port, then release it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}{}", port, ALGO_PATH);

        let scorer = HttpSentimentScorer::new(url, "k", Duration::from_secs(1)).unwrap();
        let err = scorer.score(&batch()).await.unwrap_err();
        assert!(matches!(err, AggregationError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_compound_is_malformed() {
        let (server, scorer) = setup(Duration::from_secs(5)).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"compound": 0.5}, {"positive": 0.9}]
            })))
            .mount(&server)
            .await;

        match scorer.score(&batch()).await {
            Err(AggregationError::MalformedResponse(msg)) => assert!(msg.contains("item 1")),
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let (server, scorer) = setup(Duration::from_secs(5)).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = scorer.score(&batch()).await.unwrap_err();
        assert!(matches!(err, AggregationError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_scores_empty_result() {
        assert_eq!(parse_scores(br#"{"result": []}"#).unwrap(), vec![]);
    }

    #[test]
    fn test_parse_scores_rejects_string_compound() {
        let err = parse_scores(br#"{"result": [{"compound": "0.5"}]}"#).unwrap_err();
        assert!(matches!(err, AggregationError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_scores_rejects_non_array_result() {
        let err = parse_scores(br#"{"result": {"compound": 0.5}}"#).unwrap_err();
        assert!(matches!(err, AggregationError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_scores_integer_compound() {
        assert_eq!(
            parse_scores(br#"{"result": [{"compound": 1}]}"#).unwrap(),
            vec![ScoreItem { compound: 1.0 }]
        );
    }
}
