use std::sync::Arc;

const INBOUND_SUFFIX: &str = "keyword";
const OUTBOUND_SUFFIX: &str = "sentiment";
const SSL_MARKER: &str = "+ssl";

/// Topic names derived from a single base string.
///
/// Inbound text arrives on `{base}-keyword`; aggregates leave on
/// `{base}-sentiment`. Both are pre-computed once at startup.
#[derive(Debug, Clone)]
pub struct TopicNames {
    inbound: Arc<str>,
    outbound: Arc<str>,
}

impl TopicNames {
    pub fn new(base: &str) -> Self {
        let base = base.trim();
        Self {
            inbound: format!("{}-{}", base, INBOUND_SUFFIX).into(),
            outbound: format!("{}-{}", base, OUTBOUND_SUFFIX).into(),
        }
    }

    /// Topic the relay consumes raw text from
    #[inline]
    pub fn inbound(&self) -> &str {
        &self.inbound
    }

    /// Topic the relay publishes aggregates to
    #[inline]
    pub fn outbound(&self) -> &str {
        &self.outbound
    }
}

/// Strip every `+ssl` scheme marker from a broker connection string.
///
/// Returns the cleaned string and whether any marker was present, in which
/// case the connection must be made over TLS.
pub fn normalize_broker_url(url: &str) -> (String, bool) {
    let tls = url.contains(SSL_MARKER);
    (url.replace(SSL_MARKER, ""), tls)
}

/// Mask any `user:pass@` userinfo in a (possibly comma-separated) broker
/// connection string so it can be logged.
pub fn redact_broker_url(url: &str) -> String {
    url.split(',')
        .map(|server| {
            let (scheme, rest) = match server.find("://") {
                Some(i) => server.split_at(i + 3),
                None => ("", server),
            };
            let authority_end = rest.find('/').unwrap_or(rest.len());
            match rest[..authority_end].rfind('@') {
                Some(at) => format!("{}***@{}", scheme, &rest[at + 1..]),
                None => server.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
