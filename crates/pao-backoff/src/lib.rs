//! Reconnect backoff for the pao game client.
//!
//! Two pieces:
//!
//! - [`BackoffPolicy`]: a pure description of the retry schedule: start
//!   at `initial_delay`, multiply by `multiplier` after every attempt, never
//!   exceed `max_delay`, give up after `max_attempts`. No hidden state, so
//!   the whole schedule can be checked in a unit test.
//! - [`RetryTimer`]: a single timer slot the connection actor waits on.
//!
//! # Integration
//!
//! The timer is designed to sit inside the client actor's `tokio::select!`
//! loop next to the transport and the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle commands */ }
//!         frame = next_frame(&transport) => { /* reconcile */ }
//!         () = retry.wait() => { /* dial again */ }
//!     }
//! }
//! ```
//!
//! Because there is only one slot, arming it again replaces the previous
//! deadline: two retries can never be pending at once.

use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Retry schedule for reconnecting after the transport drops.
///
/// The default is 1 s, ×1.5 per attempt, capped at 30 s, 10 attempts:
///
/// ```text
/// 1000, 1500, 2250, 3375, 5062.5, 7593.75, 11390.625,
/// 17085.9375, 25628.90625, 30000 (ms)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied after each retry.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// How many retries are allowed before giving up for good.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            multiplier: 1.5,
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Fix any out-of-range values so the policy is safe to use.
    ///
    /// Rules:
    /// - `initial_delay` of zero becomes 1 ms.
    /// - `multiplier` below 1.0 (or not finite) becomes 1.0.
    /// - `max_delay` is raised to at least `initial_delay`.
    pub fn validated(mut self) -> Self {
        if self.initial_delay.is_zero() {
            warn!("initial_delay is zero, using 1 ms");
            self.initial_delay = Duration::from_millis(1);
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            warn!(
                multiplier = self.multiplier,
                "backoff multiplier below 1.0, clamping"
            );
            self.multiplier = 1.0;
        }
        if self.max_delay < self.initial_delay {
            self.max_delay = self.initial_delay;
        }
        self
    }

    /// The delay that follows `previous`: `min(previous × multiplier, max)`.
    pub fn next_delay(&self, previous: Duration) -> Duration {
        let grown = previous.as_secs_f64() * self.multiplier;
        Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// `true` once `count` retries exceed `max_attempts`.
    pub fn attempts_exhausted(&self, count: u32) -> bool {
        count > self.max_attempts
    }

    /// The full (infinite) delay schedule, starting at `initial_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay), |d| {
            Some(self.next_delay(*d))
        })
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A single, re-armable retry deadline.
#[derive(Debug, Default)]
pub struct RetryTimer {
    deadline: Option<TokioInstant>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `delay` from now, replacing any earlier
    /// deadline.
    pub fn schedule(&mut self, delay: Duration) {
        if self.deadline.is_some() {
            debug!("retry timer re-armed before firing");
        }
        self.deadline = Some(TokioInstant::now() + delay);
        trace!(?delay, "retry timer armed");
    }

    /// Disarms the timer. A no-op when nothing is pending.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            trace!("retry timer cancelled");
        }
    }

    /// Whether a retry is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending retry will fire.
    pub fn deadline(&self) -> Option<TokioInstant> {
        self.deadline
    }

    /// Waits for the pending retry, then disarms.
    ///
    /// When nothing is armed this future pends forever, which lets
    /// `tokio::select!` keep serving its other branches. Dropping the
    /// future before it fires leaves the deadline in place.
    pub async fn wait(&mut self) {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            return;
        };
        time::sleep_until(deadline).await;
        self.deadline = None;
    }
}
