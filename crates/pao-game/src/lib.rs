//! Game state reconciliation for the pao game client.
//!
//! The [`Reconciler`] applies decoded server envelopes to a local
//! [`GameState`] and keeps the session store in step with what the server
//! says. It does no I/O of its own apart from the store calls, and it is
//! owned by exactly one task (the client actor), so it needs no locking.
//!
//! # Key types
//!
//! - [`Reconciler`]: the envelope → state transition function
//! - [`GameState`]: everything the UI renders
//! - [`GameSnapshot`]: the latest board position, replaced wholesale
//! - [`GameEvent`]: what changed, for the UI's event stream

mod reconciler;
mod state;

pub use reconciler::{GameEvent, Reconciler};
pub use state::{
    ChatLogEntry, GameSnapshot, GameState, SYSTEM_AUTHOR, TerminalOutcome,
};
