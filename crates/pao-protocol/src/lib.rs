//! Wire protocol for the pao game client.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Types** ([`Command`], [`Inbound`], [`ConnectionParams`], etc.):
//!   the envelopes that travel on the wire and the parameters encoded into
//!   the connection target.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Inbound) → Game reconciler (state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    BoardUpdate, ChatMessage, ColorAssigned, Command, ConnectionParams,
    GameId, GameOver, Inbound, PlayerInfo, SessionAssigned, SessionToken,
};
