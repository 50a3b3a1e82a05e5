//! sentiment-relay: windowed text-to-sentiment relay
//!
//! Consumes raw text from `{base}-keyword`, strips tweet boilerplate, keeps
//! a bounded window of recent items, scores the window on a fixed cadence
//! through an external sentiment API and publishes the mean compound score
//! to `{base}-sentiment`.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod sampler;
pub mod sanitize;
pub mod scorer;
pub mod server;
pub mod window;

pub use config::Config;
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
