//! The client actor: one task that owns the transport, the retry timer,
//! the game state and the session store.
//!
//! Everything that can happen to a client arrives at a single
//! `tokio::select!`:
//!
//! 1. a command from a [`GameClient`](crate::GameClient) handle,
//! 2. the next frame from the open transport,
//! 3. the retry timer firing.
//!
//! Handlers run one at a time, so no state here needs a lock. Dials are
//! awaited inline, which is what keeps at most one attempt in flight.

use pao_backoff::RetryTimer;
use pao_game::{GameEvent, GameState, Reconciler};
use pao_protocol::{Codec, Command, ConnectionParams, JsonCodec};
use pao_session::SessionStore;
use pao_transport::{Connection, Connector};
use tokio::sync::{mpsc, oneshot};

use crate::lifecycle::{Closure, ConnectionLifecycle};
use crate::{ClientConfig, ClientError, ClientEvent, ConnectionState};

/// Orange line appended for every scheduled retry.
fn reconnecting_notice(attempt: u32) -> String {
    format!("Connection lost. Reconnecting... (attempt {attempt})")
}

/// Red line appended once retries are exhausted.
fn gave_up_notice(attempts: u32) -> String {
    format!("Connection lost. Unable to reconnect after {attempts} attempts.")
}

/// Commands sent to the actor through its channel.
pub(crate) enum ClientCommand {
    /// Start a connect cycle.
    Connect {
        params: ConnectionParams,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    /// Write a command to the server if a transport is open.
    Send { command: Command },
    /// Query the lifecycle state.
    GetConnectionState {
        reply: oneshot::Sender<ConnectionState>,
    },
    /// Query a copy of the game state.
    GetGameState { reply: oneshot::Sender<GameState> },
    /// Close the transport and stop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Whether the run loop keeps going after a command.
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct ClientActor<C: Connector, S: SessionStore> {
    pub(crate) config: ClientConfig,
    pub(crate) lifecycle: ConnectionLifecycle,
    pub(crate) connector: C,
    pub(crate) store: S,
    pub(crate) codec: JsonCodec,
    /// The single live transport, if any.
    pub(crate) transport: Option<C::Connection>,
    pub(crate) retry: RetryTimer,
    pub(crate) reconciler: Reconciler,
    pub(crate) commands: mpsc::Receiver<ClientCommand>,
    pub(crate) events: mpsc::UnboundedSender<ClientEvent>,
}

impl<C: Connector, S: SessionStore> ClientActor<C, S> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    pub(crate) async fn run(mut self) {
        tracing::info!(server = %self.config.server, "client actor started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!("all client handles dropped");
                        break;
                    };
                    if let Flow::Stop = self.handle_command(cmd).await {
                        break;
                    }
                }
                frame = next_frame(self.transport.as_ref()) => {
                    self.handle_frame(frame).await;
                }
                () = self.retry.wait() => {
                    self.handle_retry().await;
                }
            }
        }

        self.stop().await;
        tracing::info!("client actor stopped");
    }

    async fn handle_command(&mut self, cmd: ClientCommand) -> Flow {
        match cmd {
            ClientCommand::Connect { params, reply } => {
                let result = self.handle_connect(params).await;
                let _ = reply.send(result);
            }
            ClientCommand::Send { command } => self.send(&command).await,
            ClientCommand::GetConnectionState { reply } => {
                let _ = reply.send(self.lifecycle.state());
            }
            ClientCommand::GetGameState { reply } => {
                let _ = reply.send(self.reconciler.state().clone());
            }
            ClientCommand::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Manual connect: fill in a remembered token, then dial once. A
    /// failed dial falls through to the reconnect path like any closure.
    async fn handle_connect(
        &mut self,
        mut params: ConnectionParams,
    ) -> Result<(), ClientError> {
        let state = self.lifecycle.state();
        if !self.lifecycle.can_connect() {
            return Err(ClientError::InvalidState(state));
        }

        if params.resume_token().is_none() {
            match self.store.load(&params.game_id) {
                Ok(Some(token)) if !token.is_empty() => {
                    tracing::info!(
                        game_id = %params.game_id,
                        "found remembered session"
                    );
                    params.session_token = Some(token);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    game_id = %params.game_id,
                    error = %e,
                    "failed to load session"
                ),
            }
        }

        // Reject a bad server address before touching any state.
        params.target(&self.config.server)?;

        let resumed = params.resume_token().is_some();
        let started = self.reconciler.begin_cycle(&params.game_id, resumed);
        self.emit_game(started);

        self.retry.cancel();
        self.lifecycle.begin_connect(params);
        self.emit(ClientEvent::StateChanged(ConnectionState::Connecting));
        self.dial().await;
        Ok(())
    }

    async fn handle_frame(
        &mut self,
        frame: Result<Option<Vec<u8>>, <C::Connection as Connection>::Error>,
    ) {
        match frame {
            Ok(Some(bytes)) => match self.codec.decode_inbound(&bytes) {
                Ok(inbound) => {
                    tracing::debug!(action = inbound.action(), "envelope");
                    let events = self.reconciler.apply(inbound, &self.store);
                    let over = events
                        .iter()
                        .any(|e| matches!(e, GameEvent::GameOver(_)));
                    self.emit_game(events);
                    if over {
                        // Decided games are not resumed.
                        self.terminate();
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "dropping undecodable frame");
                }
            },
            Ok(None) => {
                tracing::info!("connection closed by server");
                self.on_closed().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport error");
                self.on_closed().await;
            }
        }
    }

    async fn handle_retry(&mut self) {
        if !self.lifecycle.should_retry() {
            tracing::debug!(
                state = %self.lifecycle.state(),
                "stale retry ignored"
            );
            return;
        }
        if let Some(token) = self.reconciler.session_token().cloned() {
            self.lifecycle.refresh_token(&token);
        }
        tracing::info!(
            attempt = self.lifecycle.attempts(),
            next_delay = ?self.lifecycle.current_delay(),
            "reconnecting"
        );
        self.dial().await;
    }

    /// One dial with the current params, bounded by `connect_timeout`.
    async fn dial(&mut self) {
        let target = self
            .lifecycle
            .params()
            .map(|p| p.target(&self.config.server));
        let target = match target {
            Some(Ok(url)) => url,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "cannot build connection target");
                self.on_closed().await;
                return;
            }
            None => return,
        };

        let timeout = self.config.connect_timeout;
        tracing::debug!(%target, "dialling");
        let dial = self.connector.connect(target.as_str());
        let dialled = tokio::time::timeout(timeout, dial).await;
        match dialled {
            Ok(Ok(conn)) => self.on_open(conn).await,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "dial failed");
                self.on_closed().await;
            }
            Err(_) => {
                tracing::warn!(?timeout, "dial timed out");
                self.on_closed().await;
            }
        }
    }

    async fn on_open(&mut self, conn: C::Connection) {
        tracing::info!(conn_id = %conn.id(), "connected");
        self.transport = Some(conn);
        self.lifecycle.on_open();
        self.emit(ClientEvent::StateChanged(ConnectionState::Open));
        self.emit(ClientEvent::Connected);
        self.send(&Command::BoardQuery).await;
    }

    /// The transport is gone (or never came up). Decide whether to retry.
    async fn on_closed(&mut self) {
        if let Some(conn) = self.transport.take() {
            let _ = conn.close().await;
        }

        let before = self.lifecycle.state();
        match self.lifecycle.on_closed(self.retry.is_armed()) {
            Closure::Ignored => {}
            Closure::Retry { attempt, delay } => {
                tracing::info!(attempt, ?delay, "scheduling reconnect");
                self.retry.schedule(delay);
                if before != ConnectionState::Reconnecting {
                    self.emit(ClientEvent::StateChanged(
                        ConnectionState::Reconnecting,
                    ));
                }
                let note = self
                    .reconciler
                    .note(reconnecting_notice(attempt), "orange");
                self.emit_game([note]);
                self.emit(ClientEvent::Reconnecting { attempt, delay });
            }
            Closure::GaveUp { attempts } => {
                tracing::warn!(attempts, "giving up on reconnecting");
                self.retry.cancel();
                self.emit(ClientEvent::StateChanged(
                    ConnectionState::Terminated,
                ));
                let note =
                    self.reconciler.note(gave_up_notice(attempts), "red");
                self.emit_game([note]);
                self.emit(ClientEvent::GaveUp { attempts });
            }
        }
    }

    /// No reconnecting from here on. An open transport is left alone.
    fn terminate(&mut self) {
        self.retry.cancel();
        if self.lifecycle.state() != ConnectionState::Terminated {
            self.lifecycle.terminate();
            self.emit(ClientEvent::StateChanged(ConnectionState::Terminated));
        }
    }

    /// Writes a command if a transport is open; otherwise drops it.
    async fn send(&mut self, command: &Command) {
        let Some(conn) = self.transport.as_ref() else {
            tracing::debug!(?command, "not connected, dropping command");
            return;
        };
        let bytes = match self.codec.encode_command(command) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode command");
                return;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            // The read side reports the closure.
            tracing::warn!(error = %e, "send failed");
        }
    }

    async fn stop(&mut self) {
        self.terminate();
        if let Some(conn) = self.transport.take() {
            let _ = conn.close().await;
        }
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn emit_game(&self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.emit(ClientEvent::Game(event));
        }
    }
}

/// The next frame from `conn`, or never if there is no transport.
async fn next_frame<T: Connection>(
    conn: Option<&T>,
) -> Result<Option<Vec<u8>>, T::Error> {
    match conn {
        Some(conn) => conn.recv().await,
        None => std::future::pending().await,
    }
}
