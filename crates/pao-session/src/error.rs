//! Error types for the session layer.

/// Errors that can occur while reading or writing stored sessions.
///
/// None of these end a game: the connection manager logs them and carries
/// on without resumption.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing file could not be read or written.
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[error("session store is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}
