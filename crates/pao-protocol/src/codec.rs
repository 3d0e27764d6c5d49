//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The rest of the client only needs something that implements [`Codec`];
//! [`JsonCodec`] is what the game server speaks.

use serde::{de::DeserializeOwned, Serialize};

use crate::types::ActionTag;
use crate::{Command, Inbound, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// Besides the generic `encode`/`decode` pair it provides the two
/// operations the client actually performs: [`encode_command`] for
/// outbound commands and [`decode_inbound`] for server envelopes.
///
/// [`encode_command`]: Codec::encode_command
/// [`decode_inbound`]: Codec::decode_inbound
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Encodes an outbound command.
    fn encode_command(
        &self,
        command: &Command,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.encode(command)
    }

    /// Decodes one server envelope.
    ///
    /// Two passes: the `Action` tag first, then the tag's payload. An
    /// unknown tag is not an error (`Inbound::Unknown`), so a newer server
    /// can add actions without breaking older clients.
    ///
    /// # Errors
    /// - `ProtocolError::Decode`: not well-formed, or a known action with
    ///   a payload of the wrong shape
    /// - `ProtocolError::MissingAction`: no `Action` tag
    fn decode_inbound(&self, data: &[u8]) -> Result<Inbound, ProtocolError> {
        let tag: ActionTag = self.decode(data)?;
        let action = tag.action.ok_or(ProtocolError::MissingAction)?;

        Ok(match action.as_str() {
            "session" => Inbound::Session(self.decode(data)?),
            "chat" => Inbound::Chat(self.decode(data)?),
            "board" => Inbound::Board(self.decode(data)?),
            "color" => Inbound::Color(self.decode(data)?),
            "gameover" => Inbound::GameOver(self.decode(data)?),
            _ => Inbound::Unknown { action },
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use pao_protocol::{Codec, Command, Inbound, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.encode_command(&Command::BoardQuery).unwrap();
/// assert_eq!(bytes, br#"{"Action":"board?"}"#);
///
/// let inbound = codec
///     .decode_inbound(br#"{"Action":"color","Color":"red"}"#)
///     .unwrap();
/// assert!(matches!(inbound, Inbound::Color(c) if c.color == "red"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
