//! Durable session store: a single JSON object on disk.
//!
//! The file maps [`session_key`]s to tokens:
//!
//! ```json
//! { "pao_session_G7": "c0ffee", "pao_session_G9": "beef" }
//! ```
//!
//! Every write replaces the whole file through a temp file + rename, so a
//! crash mid-write leaves either the old or the new contents, never half.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use pao_protocol::{GameId, SessionToken};

use crate::{SessionError, SessionStore, session_key};

type Entries = BTreeMap<String, String>;

/// A [`SessionStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileSessionStore {
    /// Opens (or prepares to create) the store at `path`.
    ///
    /// The parent directory is created if needed; the file itself is only
    /// written on the first `save`.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] if the parent directory can't be made.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        tracing::debug!(path = %path.display(), "session store opened");
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    /// Where the store lives on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Entries, SessionError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(Entries::new())
            }
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(SessionError::Corrupt)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(SessionError::Corrupt)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        change: impl FnOnce(&mut Entries) -> bool,
    ) -> Result<(), SessionError> {
        let _held = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        if change(&mut entries) {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(
        &self,
        game_id: &GameId,
    ) -> Result<Option<SessionToken>, SessionError> {
        let _held = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .read_entries()?
            .remove(&session_key(game_id))
            .map(SessionToken))
    }

    fn save(
        &self,
        game_id: &GameId,
        token: &SessionToken,
    ) -> Result<(), SessionError> {
        self.update(|entries| {
            entries.insert(session_key(game_id), token.as_str().to_string());
            true
        })?;
        tracing::debug!(%game_id, "session saved");
        Ok(())
    }

    fn clear(&self, game_id: &GameId) -> Result<(), SessionError> {
        self.update(|entries| entries.remove(&session_key(game_id)).is_some())
    }
}
