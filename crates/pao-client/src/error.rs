//! Unified error type for the pao client.

use pao_protocol::ProtocolError;

use crate::ConnectionState;

/// Errors returned by [`GameClient`](crate::GameClient).
///
/// Most failures never reach the caller: dial and transport failures
/// trigger reconnection, malformed envelopes are dropped, store failures
/// are logged. What remains is a bad server address, misuse of the
/// handle and a dead actor.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection target could not be built from the server address.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The operation is not allowed in the current connection state.
    #[error("not allowed while {0}")]
    InvalidState(ConnectionState),

    /// The client's background task has stopped.
    #[error("client is shut down")]
    ClientClosed,
}
