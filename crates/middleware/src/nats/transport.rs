use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::latency::now_tsc;
use crate::transport::{Subscription, Transport, TransportMessage, PARTITION_HEADER};

const CERT_FILE: &str = "client.crt";
const KEY_FILE: &str = "client.key";

/// Client certificate/key pair on disk, as the TLS connector expects them
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TlsIdentity {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Write PEM contents to `dir/client.crt` and `dir/client.key`.
    ///
    /// Credentials arrive through the environment, but the connector only
    /// reads them from files. The key file is made owner-readable only.
    pub fn write_pem(dir: &Path, cert_pem: &str, key_pem: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let identity = Self::new(dir.join(CERT_FILE), dir.join(KEY_FILE));
        std::fs::write(&identity.cert_path, cert_pem)?;
        std::fs::write(&identity.key_path, key_pem)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&identity.key_path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(cert = %identity.cert_path.display(), key = %identity.key_path.display(), "Wrote TLS identity");
        Ok(identity)
    }
}

/// Copy the headers the relay understands out of a NATS header map
fn known_headers(headers: Option<&async_nats::HeaderMap>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(partition) = headers.and_then(|h| h.get(PARTITION_HEADER)) {
        out.insert(PARTITION_HEADER.to_string(), partition.as_str().to_string());
    }
    out
}

/// NATS subscription wrapper
struct NatsSubscription {
    subscriber: async_nats::Subscriber,
}

impl NatsSubscription {
    fn new(subscriber: async_nats::Subscriber) -> Self {
        Self { subscriber }
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        let msg = self
            .subscriber
            .next()
            .await
            .ok_or_else(|| TransportError::Closed("subscription closed".to_string()))?;

        Ok(TransportMessage {
            subject: msg.subject.to_string(),
            headers: known_headers(msg.headers.as_ref()),
            payload: msg.payload,
            timestamp: now_tsc(),
            sequence: None,
        })
    }

    async fn unsubscribe(mut self: Box<Self>) -> Result<(), TransportError> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }
}

/// NATS transport implementation
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Create a new NatsTransport from an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to NATS server without client authentication
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Connect with a client certificate (mutual TLS).
    ///
    /// `url` may list several servers separated by commas.
    pub async fn connect_with_identity(
        url: &str,
        client_name: &str,
        identity: &TlsIdentity,
        require_tls: bool,
    ) -> Result<Self, TransportError> {
        let client = ConnectOptions::new()
            .name(client_name)
            .add_client_certificate(identity.cert_path.clone(), identity.key_path.clone())
            .require_tls(require_tls)
            .connect(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!(client_name, require_tls, "Connected to broker");
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    async fn publish_with_headers(
        &self,
        subject: &str,
        payload: Bytes,
        headers: HashMap<String, String>,
    ) -> Result<(), TransportError> {
        let mut nats_headers = async_nats::HeaderMap::new();
        for (k, v) in headers {
            nats_headers.insert(k, v);
        }

        self.client
            .publish_with_headers(subject.to_string(), nats_headers, payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;
        Ok(Box::new(NatsSubscription::new(subscriber)))
    }
}
