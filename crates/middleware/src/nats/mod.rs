pub mod subjects;
mod transport;

pub use subjects::{normalize_broker_url, redact_broker_url, TopicNames};
pub use transport::{NatsTransport, TlsIdentity};
