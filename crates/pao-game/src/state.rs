//! Client-side view of a game.

use chrono::{DateTime, Utc};
use pao_protocol::{BoardUpdate, GameId, PlayerInfo};
use serde::{Deserialize, Serialize};

/// Author name used for lines the client writes itself.
pub const SYSTEM_AUTHOR: &str = "System";

/// The board as of the last `board` envelope.
///
/// Replaced wholesale on every update: a field the server omitted is
/// `None` here, never the previous value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board: Option<Vec<Vec<String>>>,
    /// Whether this client may move.
    pub your_turn: bool,
    /// Captured pieces.
    pub dead: Option<Vec<String>>,
    pub last_move: Option<serde_json::Value>,
    pub last_dead: Option<serde_json::Value>,
    pub first_move: Option<serde_json::Value>,
    pub players: Option<Vec<PlayerInfo>>,
    pub player: Option<serde_json::Value>,
}

impl From<BoardUpdate> for GameSnapshot {
    fn from(update: BoardUpdate) -> Self {
        Self {
            board: update.board,
            your_turn: update.your_turn,
            dead: update.dead,
            last_move: update.last_move,
            last_dead: update.last_dead,
            first_move: update.first_move,
            players: update.players,
            player: update.player,
        }
    }
}

/// How the game ended, from this client's side. Set at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalOutcome {
    pub you_win: bool,
    pub message: String,
    pub reason: String,
}

/// One line of the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub author: String,
    pub text: String,
    pub color: String,
    /// Whether the author is a logged-in user. Always `false` for
    /// system lines.
    pub authentic: bool,
    /// Local receipt time.
    pub received_at: DateTime<Utc>,
}

impl ChatLogEntry {
    /// A line written by the client itself (connection notices etc.).
    pub fn system(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            author: SYSTEM_AUTHOR.to_string(),
            text: text.into(),
            color: color.into(),
            authentic: false,
            received_at: Utc::now(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.author == SYSTEM_AUTHOR && !self.authentic
    }
}

/// Everything the UI needs to draw the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// The game this client is in. Updated from `session` envelopes.
    pub game_id: GameId,
    pub snapshot: GameSnapshot,
    /// Which side we play, once the server says so.
    pub my_color: Option<String>,
    /// Append-only, uncapped.
    pub chat: Vec<ChatLogEntry>,
    pub outcome: Option<TerminalOutcome>,
}

impl GameState {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            snapshot: GameSnapshot::default(),
            my_color: None,
            chat: Vec::new(),
            outcome: None,
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }
}
