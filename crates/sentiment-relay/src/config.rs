use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sentiment_middleware::nats::{normalize_broker_url, redact_broker_url};

use crate::error::ConfigError;

pub const DEFAULT_SENTIMENT_API_URL: &str =
    "https://api.algorithmia.com/v1/algo/nlp/SocialSentimentAnalysis/0.1.5";
pub const DEFAULT_WINDOW_CAPACITY: usize = 20;
pub const MAX_WINDOW_CAPACITY: usize = 10_000;
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct Config {
    /// Broker connection string with any `+ssl` markers removed
    pub broker_url: String,
    /// Whether the original connection string asked for TLS
    pub broker_tls: bool,
    pub client_cert_pem: String,
    pub client_key_pem: String,
    pub cert_dir: PathBuf,
    pub topic_base: String,
    pub output_partition: u32,
    pub sentiment_api_url: String,
    pub sentiment_api_key: String,
    pub sentiment_api_timeout: Duration,
    pub window_capacity: usize,
    pub sample_interval: Duration,
    /// Skip ticks whose window has not changed since the last forwarded batch
    pub skip_unchanged: bool,
    pub health_addr: SocketAddr,
    pub shutdown_grace: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of logs
        f.debug_struct("Config")
            .field("broker_url", &redact_broker_url(&self.broker_url))
            .field("broker_tls", &self.broker_tls)
            .field("cert_dir", &self.cert_dir)
            .field("topic_base", &self.topic_base)
            .field("output_partition", &self.output_partition)
            .field("sentiment_api_url", &self.sentiment_api_url)
            .field("sentiment_api_timeout", &self.sentiment_api_timeout)
            .field("window_capacity", &self.window_capacity)
            .field("sample_interval", &self.sample_interval)
            .field("skip_unchanged", &self.skip_unchanged)
            .field("health_addr", &self.health_addr)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let client_cert_pem = required("BROKER_CLIENT_CERT")?;
        let client_key_pem = required("BROKER_CLIENT_CERT_KEY")?;
        let raw_url = required("BROKER_URL")?;
        let sentiment_api_key = required("SENTIMENT_API_KEY")?;
        let topic_base = required("TOPIC_BASE")?;

        let (broker_url, broker_tls) = normalize_broker_url(raw_url.trim());

        let sentiment_api_url =
            get("SENTIMENT_API_URL").unwrap_or_else(|| DEFAULT_SENTIMENT_API_URL.into());
        let sentiment_api_timeout = parse_millis(
            "SENTIMENT_API_TIMEOUT_MS",
            get("SENTIMENT_API_TIMEOUT_MS"),
            DEFAULT_API_TIMEOUT,
        )?;
        let window_capacity = parse_or(
            "WINDOW_CAPACITY",
            get("WINDOW_CAPACITY"),
            DEFAULT_WINDOW_CAPACITY,
        )?;
        if !(1..=MAX_WINDOW_CAPACITY).contains(&window_capacity) {
            return Err(ConfigError::Invalid {
                key: "WINDOW_CAPACITY",
                reason: format!("must be between 1 and {}", MAX_WINDOW_CAPACITY),
            });
        }
        let sample_interval = parse_millis(
            "SAMPLE_INTERVAL_MS",
            get("SAMPLE_INTERVAL_MS"),
            DEFAULT_SAMPLE_INTERVAL,
        )?;
        let skip_unchanged = parse_bool("SAMPLE_SKIP_UNCHANGED", get("SAMPLE_SKIP_UNCHANGED"))?;
        let output_partition = parse_or("OUTPUT_PARTITION", get("OUTPUT_PARTITION"), 0u32)?;
        let cert_dir = get("CERT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let health_addr = parse_or(
            "HEALTH_ADDR",
            get("HEALTH_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let shutdown_grace = parse_millis(
            "SHUTDOWN_GRACE_MS",
            get("SHUTDOWN_GRACE_MS"),
            DEFAULT_SHUTDOWN_GRACE,
        )?;

        Ok(Self {
            broker_url,
            broker_tls,
            client_cert_pem,
            client_key_pem,
            cert_dir,
            topic_base,
            output_partition,
            sentiment_api_url,
            sentiment_api_key,
            sentiment_api_timeout,
            window_capacity,
            sample_interval,
            skip_unchanged,
            health_addr,
            shutdown_grace,
        })
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{:?}: {}", v, e),
        }),
    }
}

fn parse_millis(
    key: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let millis = parse_or(key, value, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(millis))
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                reason: format!("{:?} is not a boolean", v),
            }),
        },
    }
}
