//! Process-local session store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use pao_protocol::{GameId, SessionToken};

use crate::{SessionError, SessionStore, session_key};

/// A [`SessionStore`] kept in memory. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    /// Tokens keyed by [`session_key`].
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(
        &self,
        game_id: &GameId,
    ) -> Result<Option<SessionToken>, SessionError> {
        Ok(self
            .lock()
            .get(&session_key(game_id))
            .map(|t| SessionToken(t.clone())))
    }

    fn save(
        &self,
        game_id: &GameId,
        token: &SessionToken,
    ) -> Result<(), SessionError> {
        self.lock()
            .insert(session_key(game_id), token.as_str().to_string());
        Ok(())
    }

    fn clear(&self, game_id: &GameId) -> Result<(), SessionError> {
        self.lock().remove(&session_key(game_id));
        Ok(())
    }
}
