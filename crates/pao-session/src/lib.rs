//! Session-token persistence for the pao game client.
//!
//! When the server seats a player it hands out an opaque session token.
//! Storing that token per game lets a client that restarts (or simply
//! reconnects) reclaim the same seat instead of joining as a stranger.
//!
//! - [`SessionStore`]: the `load` / `save` / `clear` contract
//! - [`FileSessionStore`]: durable JSON file, survives restarts
//! - [`MemorySessionStore`]: process-local, for tests and embedding
//!
//! Every entry lives under [`session_key`]`(game_id)`, i.e.
//! `"pao_session_<gameId>"`.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← loads a token before dialling
//! Game reconciler ← saves on `session`, clears on `gameover`
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides GameId, SessionToken
//! ```

mod error;
mod file;
mod memory;
mod store;

pub use error::SessionError;
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use store::{SessionStore, session_key, SESSION_KEY_PREFIX};
