//! Shared, cancellable deadline observed by every pipeline stage.
//!
//! # Design
//! - One `Deadline` is derived per run and passed by reference into each stage call.
//! - Expiry is a point on the tokio clock; explicit cancellation is a `CancellationToken`.
//! - `bound` races arbitrary work against both, so suspension points stay interruptible.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Upper bound applied when a budget would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Reason a deadline stopped further work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The time budget ran out.
    Expired,
    /// The deadline was cancelled explicitly (for example on interrupt).
    Cancelled,
}

impl Display for Interruption {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => formatter.write_str("deadline expired"),
            Self::Cancelled => formatter.write_str("deadline cancelled"),
        }
    }
}

/// A single point-in-time bound shared by the capture and transfer stages.
#[derive(Debug, Clone)]
pub struct Deadline {
    budget: Duration,
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// Derive a deadline that expires `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            budget,
            expires_at,
            token: CancellationToken::new(),
        }
    }

    /// Total budget this deadline was created with.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Instant at which the deadline expires.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry; zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Time consumed since the deadline was derived.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.budget.saturating_sub(self.remaining())
    }

    /// Cancel the deadline; every clone observes the cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this deadline, for wiring signal handlers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the deadline was cancelled explicitly.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the time budget has run out.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Fail fast when no further work may be initiated.
    ///
    /// # Errors
    ///
    /// Returns the interruption reason when the deadline is cancelled or expired.
    /// Cancellation takes precedence over expiry.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        if self.is_expired() {
            return Err(Interruption::Expired);
        }
        Ok(())
    }

    /// Resolve once the deadline is cancelled or expires.
    pub async fn interrupted(&self) -> Interruption {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Interruption::Cancelled,
            () = sleep_until(self.expires_at) => Interruption::Expired,
        }
    }

    /// Run `work` until it completes or the deadline interrupts it.
    ///
    /// The future is dropped on interruption, which aborts any in-flight I/O it owns.
    ///
    /// # Errors
    ///
    /// Returns the interruption reason when the deadline fires before `work` completes,
    /// or when it had already fired before `work` was polled.
    pub async fn bound<F>(&self, work: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            output = work => Ok(output),
        }
    }
}
