//! Connection lifecycle state machine.
//!
//! Pure bookkeeping: no I/O, no timers. The actor feeds it what happened
//! (a connect was requested, a dial succeeded, the transport went away)
//! and acts on what it returns.
//!
//! ```text
//!   Idle ──connect()──→ Connecting ──dial ok──→ Open
//!                           │                    │ closed / dial failed
//!                           │ dial failed        ▼
//!                           └─────────────→ Reconnecting ──retry ok──→ Open
//!
//!   any state ──attempts exhausted / gameover / shutdown──→ Terminated
//! ```
//!
//! `Terminated` is absorbing.

use std::fmt;
use std::time::Duration;

use pao_backoff::BackoffPolicy;
use pao_protocol::{ConnectionParams, SessionToken};
use serde::{Deserialize, Serialize};

/// Where the client is in its connection lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// The first dial of a manual connect is in progress.
    Connecting,
    /// A transport is open.
    Open,
    /// The transport was lost; a retry is scheduled or being dialled.
    Reconnecting,
    /// Retries exhausted, game decided, or shut down. Final.
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// What the actor should do about a lost (or never opened) transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closure {
    /// Already handled, or nothing left to do.
    Ignored,
    /// Arm the retry timer.
    Retry { attempt: u32, delay: Duration },
    /// Out of attempts; the client is now terminated.
    GaveUp { attempts: u32 },
}

/// The lifecycle bookkeeping for one client.
#[derive(Debug)]
pub(crate) struct ConnectionLifecycle {
    policy: BackoffPolicy,
    state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    attempts: u32,
    /// Delay the next retry will wait.
    delay: Duration,
    /// What the next dial will use.
    params: Option<ConnectionParams>,
}

impl ConnectionLifecycle {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        let delay = policy.initial_delay;
        Self {
            policy,
            state: ConnectionState::Idle,
            attempts: 0,
            delay,
            params: None,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn current_delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn params(&self) -> Option<&ConnectionParams> {
        self.params.as_ref()
    }

    /// Whether a manual connect is allowed right now.
    pub(crate) fn can_connect(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Idle | ConnectionState::Reconnecting
        )
    }

    /// Records a manual connect. Callers check [`can_connect`] first.
    ///
    /// The params are kept whether or not the dial succeeds, so a retry
    /// after a failed manual connect goes to the game that was asked for.
    /// With a single set of params per client this is the same as the last
    /// params that opened.
    ///
    /// [`can_connect`]: Self::can_connect
    pub(crate) fn begin_connect(&mut self, params: ConnectionParams) {
        self.params = Some(params);
        self.state = ConnectionState::Connecting;
    }

    /// A dial succeeded: back to a clean slate.
    pub(crate) fn on_open(&mut self) {
        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.delay = self.policy.initial_delay;
    }

    /// The transport closed, errored, or a dial failed.
    ///
    /// `retry_pending` tells whether a retry is already armed; a second
    /// closure report for the same outage is then ignored.
    pub(crate) fn on_closed(&mut self, retry_pending: bool) -> Closure {
        match self.state {
            ConnectionState::Terminated => return Closure::Ignored,
            ConnectionState::Reconnecting if retry_pending => {
                return Closure::Ignored;
            }
            _ => {}
        }

        self.state = ConnectionState::Reconnecting;
        self.attempts += 1;

        if self.policy.attempts_exhausted(self.attempts) {
            self.state = ConnectionState::Terminated;
            return Closure::GaveUp {
                attempts: self.policy.max_attempts,
            };
        }

        let delay = self.delay;
        self.delay = self.policy.next_delay(delay);
        Closure::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Whether a fired retry should still dial.
    pub(crate) fn should_retry(&self) -> bool {
        self.state == ConnectionState::Reconnecting && self.params.is_some()
    }

    /// Swaps in the latest server-issued token for the next dial.
    pub(crate) fn refresh_token(&mut self, token: &SessionToken) {
        if let Some(params) = self.params.as_mut() {
            params.session_token = Some(token.clone());
        }
    }

    /// Enters the absorbing state.
    pub(crate) fn terminate(&mut self) {
        self.state = ConnectionState::Terminated;
    }
}
