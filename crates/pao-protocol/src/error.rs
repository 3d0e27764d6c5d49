//! Error types for the protocol layer.
//!
//! Decode failures are never fatal to a session: the caller drops the one
//! envelope and keeps reading.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, or a known action whose
    /// fields have the wrong shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed data with no `Action` tag.
    #[error("envelope has no Action tag")]
    MissingAction,

    /// The connection target could not be built.
    #[error("invalid connection target: {0}")]
    InvalidTarget(#[from] url::ParseError),
}
