//! sentiment-middleware: Pluggable broker abstractions
//!
//! Provides the `Transport`/`Subscription` traits used by the relay, with a
//! NATS implementation for production and an in-memory one for testing.

pub mod error;
pub mod latency;
pub mod memory;
pub mod nats;
pub mod transport;

pub use error::TransportError;
pub use latency::{now_tsc, CLOCK};
pub use memory::InMemoryTransport;
pub use nats::{NatsTransport, TlsIdentity, TopicNames};
pub use transport::{Subscription, Transport, TransportMessage};
