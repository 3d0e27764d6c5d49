//! `GameClient` handle and the events it reports.

use std::time::Duration;

use pao_game::{GameEvent, GameState};
use pao_protocol::{Command, ConnectionParams};
use tokio::sync::{mpsc, oneshot};

use crate::actor::ClientCommand;
use crate::{ClientError, ConnectionState, GameClientBuilder};

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The lifecycle moved to a new state.
    StateChanged(ConnectionState),
    /// A transport opened (first connect or a successful retry).
    Connected,
    /// The transport was lost; retry number `attempt` fires after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries are exhausted. A new client is needed to play again.
    GaveUp { attempts: u32 },
    /// The game state changed.
    Game(GameEvent),
}

/// Handle to a running client. Used to send commands to it.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The background
/// task stops when [`shutdown`](Self::shutdown) is called or every handle
/// is dropped.
#[derive(Debug, Clone)]
pub struct GameClient {
    sender: mpsc::Sender<ClientCommand>,
}

impl GameClient {
    pub(crate) fn new(sender: mpsc::Sender<ClientCommand>) -> Self {
        Self { sender }
    }

    /// Creates a new builder.
    pub fn builder() -> GameClientBuilder {
        GameClientBuilder::new()
    }

    /// Starts a connect cycle and waits for the first dial to finish.
    ///
    /// A missing or empty session token is filled in from the session
    /// store. A failed dial is not an error here: it starts the reconnect
    /// schedule, which is reported through [`ClientEvent`]s.
    ///
    /// # Errors
    /// - [`ClientError::InvalidState`] unless the client is idle or
    ///   reconnecting.
    /// - [`ClientError::Protocol`] if the server address is unusable.
    /// - [`ClientError::ClientClosed`] if the client was shut down.
    pub async fn connect(
        &self,
        params: ConnectionParams,
    ) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ClientCommand::Connect {
                params,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::ClientClosed)?;
        reply_rx.await.map_err(|_| ClientError::ClientClosed)?
    }

    /// Sends a command to the server (fire-and-forget).
    ///
    /// Without an open transport the command is dropped, not queued.
    pub async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.sender
            .send(ClientCommand::Send { command })
            .await
            .map_err(|_| ClientError::ClientClosed)
    }

    /// Sends a move in the server's notation, e.g. `"a1-a2"`.
    pub async fn send_move(
        &self,
        mv: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::Move(mv.into())).await
    }

    /// Sends a chat line.
    pub async fn chat(
        &self,
        text: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::Chat(text.into())).await
    }

    /// Resigns the game.
    pub async fn resign(&self) -> Result<(), ClientError> {
        self.send(Command::Resign).await
    }

    /// Asks the server for a fresh board.
    pub async fn request_board(&self) -> Result<(), ClientError> {
        self.send(Command::BoardQuery).await
    }

    /// Returns the current lifecycle state.
    pub async fn connection_state(
        &self,
    ) -> Result<ConnectionState, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ClientCommand::GetConnectionState { reply: reply_tx })
            .await
            .map_err(|_| ClientError::ClientClosed)?;
        reply_rx.await.map_err(|_| ClientError::ClientClosed)
    }

    /// Returns a copy of the game state.
    pub async fn game_state(&self) -> Result<GameState, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ClientCommand::GetGameState { reply: reply_tx })
            .await
            .map_err(|_| ClientError::ClientClosed)?;
        reply_rx.await.map_err(|_| ClientError::ClientClosed)
    }

    /// Closes the transport and stops the background task. Any pending
    /// retry is dropped. Calling it twice is harmless.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(ClientCommand::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            // Already stopped.
            return Ok(());
        }
        reply_rx.await.map_err(|_| ClientError::ClientClosed)
    }

    /// Whether the background task is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
