//! Wire types for the pao game protocol.
//!
//! Everything here travels as a JSON object with an `Action` tag. The
//! server's field names are PascalCase (`YourTurn`, `LastMove`) with a
//! couple of all-caps acronyms (`SessionID`, `GameID`), so most structs use
//! `rename_all = "PascalCase"` and spell out the exceptions.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of one game instance, allocated by the lobby.
///
/// Opaque to the client; it is only echoed back in the connection target
/// and used to key the stored session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Server-issued token that lets a reconnecting client reclaim its seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

// ---------------------------------------------------------------------------
// ConnectionParams: what goes into the connection target
// ---------------------------------------------------------------------------

/// Parameters for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Name shown to the opponent.
    pub display_name: String,
    /// The game to join.
    pub game_id: GameId,
    /// Prior session token, if the client is resuming a seat.
    pub session_token: Option<SessionToken>,
}

impl ConnectionParams {
    pub fn new(display_name: impl Into<String>, game_id: GameId) -> Self {
        Self {
            display_name: display_name.into(),
            game_id,
            session_token: None,
        }
    }

    #[must_use]
    pub fn with_session_token(mut self, token: SessionToken) -> Self {
        self.session_token = Some(token);
        self
    }

    /// Returns the session token if one is set and non-empty.
    pub fn resume_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref().filter(|t| !t.is_empty())
    }

    /// Builds the transport target `ws://<server>/game?name=..&id=..`.
    ///
    /// `server` is either `host:port` (the scheme defaults to `ws`) or a
    /// full `ws://`/`wss://` base. Empty values are left out, and
    /// `sessionId` only appears when a token is known.
    pub fn target(&self, server: &str) -> Result<Url, ProtocolError> {
        let base = if server.contains("://") {
            server.to_string()
        } else {
            format!("ws://{server}")
        };
        let mut url = Url::parse(&base)?;
        url.set_path("/game");
        url.set_query(None);

        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(3);
        if !self.display_name.is_empty() {
            pairs.push(("name", self.display_name.as_str()));
        }
        if !self.game_id.0.is_empty() {
            pairs.push(("id", self.game_id.as_str()));
        }
        if let Some(token) = self.resume_token() {
            pairs.push(("sessionId", token.as_str()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Command: client → server
// ---------------------------------------------------------------------------

/// Commands the client sends.
///
/// Adjacently tagged: `{"Action":"move","Argument":"a1-a2"}`. Unit
/// variants carry no `Argument` at all: `{"Action":"board?"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Action", content = "Argument")]
pub enum Command {
    /// Ask for the full board; sent right after every open.
    #[serde(rename = "board?")]
    BoardQuery,
    /// A move in the server's notation. Legality is the server's call.
    #[serde(rename = "move")]
    Move(String),
    /// A chat line.
    #[serde(rename = "chat")]
    Chat(String),
    /// Concede the game.
    #[serde(rename = "resign")]
    Resign,
}

// ---------------------------------------------------------------------------
// Inbound: server → client
// ---------------------------------------------------------------------------

/// `session`: the server assigned (or re-confirmed) our seat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionAssigned {
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
    #[serde(
        rename = "GameID",
        default,
        deserialize_with = "lenient_id"
    )]
    pub game_id: String,
}

impl SessionAssigned {
    /// The token, if the server sent a non-empty one.
    pub fn token(&self) -> Option<SessionToken> {
        (!self.session_id.is_empty())
            .then(|| SessionToken(self.session_id.clone()))
    }

    /// The game id, if the server sent a non-empty one.
    pub fn game(&self) -> Option<GameId> {
        (!self.game_id.is_empty()).then(|| GameId(self.game_id.clone()))
    }
}

/// `chat`: a line from a player (or the server).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChatMessage {
    pub player: String,
    pub message: String,
    pub color: String,
    /// Whether the author is a logged-in user.
    pub auth: bool,
}

/// One seat in the roster carried by `board`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlayerInfo {
    pub name: String,
    pub color: String,
    pub is_their_turn: bool,
}

/// `board`: the whole game position as the server sees it.
///
/// Every field may be missing (or `null`); a missing field stays unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BoardUpdate {
    pub board: Option<Vec<Vec<String>>>,
    pub your_turn: bool,
    pub dead: Option<Vec<String>>,
    pub last_move: Option<serde_json::Value>,
    pub last_dead: Option<serde_json::Value>,
    pub first_move: Option<serde_json::Value>,
    pub players: Option<Vec<PlayerInfo>>,
    pub player: Option<serde_json::Value>,
}

/// `color`: which side this client plays.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ColorAssigned {
    pub color: String,
}

/// `gameover`: the final result from this client's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GameOver {
    pub you_win: bool,
    pub message: String,
    pub reason: String,
}

/// A decoded server envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Session(SessionAssigned),
    Chat(ChatMessage),
    Board(BoardUpdate),
    Color(ColorAssigned),
    GameOver(GameOver),
    /// An action this client does not know. Kept so it can be logged.
    Unknown { action: String },
}

impl Inbound {
    /// The wire `Action` tag.
    pub fn action(&self) -> &str {
        match self {
            Self::Session(_) => "session",
            Self::Chat(_) => "chat",
            Self::Board(_) => "board",
            Self::Color(_) => "color",
            Self::GameOver(_) => "gameover",
            Self::Unknown { action } => action,
        }
    }
}

/// First decode pass: only the tag, every other field ignored.
#[derive(Deserialize)]
pub(crate) struct ActionTag {
    #[serde(rename = "Action", default)]
    pub(crate) action: Option<String>,
}

/// Accepts a game id sent either as a string or as a number.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

// =========================================================================
// Tests
// =========================================================================
