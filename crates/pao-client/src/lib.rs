//! # pao-client
//!
//! Resilient real-time client for pao (banqi) games.
//!
//! A [`GameClient`] keeps one connection to the game server alive across
//! network blips: when the transport drops it retries on a capped
//! exponential schedule, presents the server-issued session token so the
//! player gets their seat back, and keeps the local game state in step
//! with the server's envelopes.
//!
//! ## Layers
//!
//! ```text
//! pao-transport  bytes over WebSocket (or in-memory for tests)
//! pao-protocol   Command / Inbound envelopes, connection target
//! pao-session    remembered session tokens per game
//! pao-backoff    retry schedule and timer
//! pao-game       envelope → GameState reconciliation
//! pao-client     lifecycle actor + handle (this crate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pao_client::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let (client, mut events) = GameClient::builder()
//!     .server("localhost:2000")
//!     .build(WebSocketConnector, MemorySessionStore::new());
//!
//! client
//!     .connect(ConnectionParams::new("ann", GameId::from("G7")))
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::GaveUp { .. } = event {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod actor;
mod client;
mod config;
mod error;
mod lifecycle;

pub use client::{ClientEvent, GameClient};
pub use config::{ClientConfig, GameClientBuilder};
pub use error::ClientError;
pub use lifecycle::ConnectionState;

pub mod prelude {
    //! The types needed to run a client.

    pub use crate::{
        ClientConfig, ClientError, ClientEvent, ConnectionState, GameClient,
        GameClientBuilder,
    };
    pub use pao_backoff::BackoffPolicy;
    pub use pao_game::{ChatLogEntry, GameEvent, GameSnapshot, GameState};
    pub use pao_protocol::{Command, ConnectionParams, GameId, SessionToken};
    pub use pao_session::{FileSessionStore, MemorySessionStore, SessionStore};
    pub use pao_transport::{MemoryConnector, WebSocketConnector};
}
