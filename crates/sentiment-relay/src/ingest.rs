//! Inbound payload decoding.
//!
//! Only the `text` field is read. Every other field is skipped without
//! numeric conversion, so oversized integer ids in the payload are harmless.

use serde::Deserialize;

use crate::error::IngestError;

#[derive(Debug, Deserialize)]
struct RawMessage {
    text: Option<String>,
}

/// Extract the raw message text from a JSON payload
pub fn decode_text(payload: &[u8]) -> Result<String, IngestError> {
    let raw: RawMessage = serde_json::from_slice(payload).map_err(IngestError::InvalidJson)?;
    raw.text.ok_or(IngestError::MissingText)
}
