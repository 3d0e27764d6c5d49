//! Client configuration and builder.

use std::time::Duration;

use pao_backoff::BackoffPolicy;
use pao_game::Reconciler;
use pao_protocol::{GameId, JsonCodec};
use pao_session::SessionStore;
use pao_transport::Connector;
use tokio::sync::mpsc;

use crate::actor::ClientActor;
use crate::lifecycle::ConnectionLifecycle;
use crate::{ClientEvent, GameClient};

/// Capacity of the handle → actor command channel.
const COMMAND_BUFFER: usize = 64;

/// Settings for one [`GameClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// `host:port` of the game server, or a full `ws://` / `wss://` base.
    pub server: String,
    /// Reconnect schedule.
    pub backoff: BackoffPolicy,
    /// Upper bound on a single dial (TCP + handshake).
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            backoff: BackoffPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for a [`GameClient`].
///
/// # Example
///
/// ```rust,ignore
/// use pao_client::prelude::*;
///
/// let store = FileSessionStore::open("sessions.json")?;
/// let (client, mut events) = GameClient::builder()
///     .server("localhost:2000")
///     .build(WebSocketConnector, store);
///
/// client.connect(ConnectionParams::new("ann", GameId::from("G7"))).await?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GameClientBuilder {
    config: ClientConfig,
}

impl GameClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Sets the reconnect schedule. Out-of-range values are clamped.
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.backoff = policy;
        self
    }

    /// Sets the per-dial timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Spawns the client task and returns its handle plus the event stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build<C, S>(
        self,
        connector: C,
        store: S,
    ) -> (GameClient, mpsc::UnboundedReceiver<ClientEvent>)
    where
        C: Connector,
        S: SessionStore,
    {
        let mut config = self.config;
        config.backoff = config.backoff.validated();

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let actor = ClientActor {
            lifecycle: ConnectionLifecycle::new(config.backoff.clone()),
            config,
            connector,
            store,
            codec: JsonCodec,
            transport: None,
            retry: pao_backoff::RetryTimer::new(),
            reconciler: Reconciler::new(GameId::from("")),
            commands: cmd_rx,
            events: event_tx,
        };
        tokio::spawn(actor.run());

        (GameClient::new(cmd_tx), event_rx)
    }
}
