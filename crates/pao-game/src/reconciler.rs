//! Applies server envelopes to the local [`GameState`].

use chrono::Utc;
use pao_protocol::{
    ChatMessage, GameId, GameOver, Inbound, SessionAssigned, SessionToken,
};
use pao_session::SessionStore;

use crate::{ChatLogEntry, GameSnapshot, GameState, TerminalOutcome};

/// System line shown when connecting with a remembered session.
pub(crate) const REJOIN_ATTEMPT: (&str, &str) =
    ("Attempting to rejoin game...", "blue");
/// System line shown when the server confirms a remembered session.
pub(crate) const REJOIN_SUCCESS: (&str, &str) =
    ("Successfully rejoined game!", "green");

/// Something the reconciler changed, for the UI's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The server issued a token and it was handed to the store.
    SessionSaved { game_id: GameId, token: SessionToken },
    /// The server accepted the remembered session of this connect cycle.
    Rejoined,
    /// The board snapshot was replaced.
    BoardReplaced(GameSnapshot),
    /// The server told us which side we play.
    ColorAssigned(String),
    /// A chat line (player or system) was appended.
    Chat(ChatLogEntry),
    /// The game ended. Emitted once.
    GameOver(TerminalOutcome),
}

/// Turns decoded envelopes into state changes.
///
/// ## Rules
///
/// | envelope   | effect                                                  |
/// |------------|---------------------------------------------------------|
/// | `session`  | remember + persist the token, maybe confirm a rejoin    |
/// | `board`    | replace the snapshot; turn stays off once the game ended |
/// | `color`    | set our side                                            |
/// | `chat`     | append a line stamped with the local time               |
/// | `gameover` | first one wins: set outcome, turn off, forget session   |
/// | unknown    | logged, ignored                                         |
#[derive(Debug)]
pub struct Reconciler {
    state: GameState,
    /// Latest token the server gave us, persisted or not.
    token: Option<SessionToken>,
    /// Set by a connect that used a remembered token; cleared by the first
    /// persisted `session` envelope after it.
    rejoin_pending: bool,
}

impl Reconciler {
    pub fn new(game_id: GameId) -> Self {
        Self {
            state: GameState::new(game_id),
            token: None,
            rejoin_pending: false,
        }
    }

    /// Starts a manual connect cycle for `game_id`.
    ///
    /// `resumed` means the connect carries a remembered session token; it
    /// appends the "attempting to rejoin" line and arms the one-shot
    /// rejoin confirmation.
    ///
    /// Switching to another game starts from a blank [`GameState`] and
    /// forgets the token the previous game was given.
    pub fn begin_cycle(
        &mut self,
        game_id: &GameId,
        resumed: bool,
    ) -> Vec<GameEvent> {
        if self.state.game_id != *game_id {
            if !self.state.game_id.as_str().is_empty() {
                tracing::info!(
                    from = %self.state.game_id,
                    to = %game_id,
                    "switching games"
                );
            }
            self.state = GameState::new(game_id.clone());
            self.token = None;
        }
        self.rejoin_pending = resumed;
        if resumed {
            let (text, color) = REJOIN_ATTEMPT;
            vec![self.note(text, color)]
        } else {
            Vec::new()
        }
    }

    /// Applies one envelope. Returns what changed (possibly nothing).
    ///
    /// Store failures are logged and never abort the update.
    pub fn apply<S: SessionStore + ?Sized>(
        &mut self,
        inbound: Inbound,
        store: &S,
    ) -> Vec<GameEvent> {
        match inbound {
            Inbound::Session(s) => self.on_session(s, store),
            Inbound::Board(update) => {
                let mut snapshot = GameSnapshot::from(update);
                if self.state.is_over() {
                    snapshot.your_turn = false;
                }
                self.state.snapshot = snapshot.clone();
                tracing::debug!(
                    your_turn = snapshot.your_turn,
                    "board replaced"
                );
                vec![GameEvent::BoardReplaced(snapshot)]
            }
            Inbound::Color(c) => {
                tracing::debug!(color = %c.color, "color assigned");
                self.state.my_color = Some(c.color.clone());
                vec![GameEvent::ColorAssigned(c.color)]
            }
            Inbound::Chat(msg) => vec![self.on_chat(msg)],
            Inbound::GameOver(over) => self.on_game_over(over, store),
            Inbound::Unknown { action } => {
                tracing::debug!(%action, "ignoring unknown envelope");
                Vec::new()
            }
        }
    }

    /// Appends a system line to the chat log.
    pub fn note(
        &mut self,
        text: impl Into<String>,
        color: impl Into<String>,
    ) -> GameEvent {
        let entry = ChatLogEntry::system(text, color);
        self.state.chat.push(entry.clone());
        GameEvent::Chat(entry)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The latest server-issued token, if one has arrived.
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    fn on_session<S: SessionStore + ?Sized>(
        &mut self,
        session: SessionAssigned,
        store: &S,
    ) -> Vec<GameEvent> {
        let (Some(token), Some(game_id)) = (session.token(), session.game())
        else {
            // Take a bare token anyway so a retry can present it.
            if let Some(token) = session.token() {
                self.token = Some(token);
            }
            tracing::debug!("session envelope incomplete, not persisted");
            return Vec::new();
        };

        self.token = Some(token.clone());
        self.state.game_id = game_id.clone();

        if let Err(e) = store.save(&game_id, &token) {
            tracing::warn!(%game_id, error = %e, "failed to persist session");
        } else {
            tracing::info!(%game_id, "session saved");
        }

        let mut events = vec![GameEvent::SessionSaved { game_id, token }];
        if std::mem::take(&mut self.rejoin_pending) {
            let (text, color) = REJOIN_SUCCESS;
            events.push(self.note(text, color));
            events.push(GameEvent::Rejoined);
        }
        events
    }

    fn on_chat(&mut self, msg: ChatMessage) -> GameEvent {
        let entry = ChatLogEntry {
            author: msg.player,
            text: msg.message,
            color: msg.color,
            authentic: msg.auth,
            received_at: Utc::now(),
        };
        self.state.chat.push(entry.clone());
        GameEvent::Chat(entry)
    }

    fn on_game_over<S: SessionStore + ?Sized>(
        &mut self,
        over: GameOver,
        store: &S,
    ) -> Vec<GameEvent> {
        if self.state.is_over() {
            tracing::debug!("duplicate gameover ignored");
            return Vec::new();
        }

        let outcome = TerminalOutcome {
            you_win: over.you_win,
            message: over.message,
            reason: over.reason,
        };
        self.state.outcome = Some(outcome.clone());
        self.state.snapshot.your_turn = false;

        let game_id = &self.state.game_id;
        if let Err(e) = store.clear(game_id) {
            tracing::warn!(%game_id, error = %e, "failed to clear session");
        }
        tracing::info!(
            %game_id,
            you_win = outcome.you_win,
            reason = %outcome.reason,
            "game over"
        );
        vec![GameEvent::GameOver(outcome)]
    }
}
