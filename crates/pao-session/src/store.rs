//! The storage contract shared by every session store.

use std::sync::Arc;

use pao_protocol::{GameId, SessionToken};

use crate::SessionError;

/// Prefix of every stored key.
pub const SESSION_KEY_PREFIX: &str = "pao_session_";

/// Returns the storage key for a game: `"pao_session_" + game_id`.
pub fn session_key(game_id: &GameId) -> String {
    format!("{SESSION_KEY_PREFIX}{game_id}")
}

/// Durable mapping from game id to session token.
///
/// Implementations hold at most one token per game. Only server-issued
/// tokens are ever written; the store never invents one.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because the store is owned by the client's
/// background task while the application may keep a handle (via `Arc`)
/// to inspect it.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the stored token for `game_id`, if any.
    fn load(
        &self,
        game_id: &GameId,
    ) -> Result<Option<SessionToken>, SessionError>;

    /// Stores `token` for `game_id`, overwriting any previous token.
    fn save(
        &self,
        game_id: &GameId,
        token: &SessionToken,
    ) -> Result<(), SessionError>;

    /// Removes the token for `game_id`. Removing a missing entry is fine.
    fn clear(&self, game_id: &GameId) -> Result<(), SessionError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(
        &self,
        game_id: &GameId,
    ) -> Result<Option<SessionToken>, SessionError> {
        (**self).load(game_id)
    }

    fn save(
        &self,
        game_id: &GameId,
        token: &SessionToken,
    ) -> Result<(), SessionError> {
        (**self).save(game_id, token)
    }

    fn clear(&self, game_id: &GameId) -> Result<(), SessionError> {
        (**self).clear(game_id)
    }
}
