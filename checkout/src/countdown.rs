//! Countdown until a reservation hold lapses.
//!
//! The remaining time is always derived from the server-issued expiry and the
//! current clock reading; nothing is decremented locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining time on a hold, in whole seconds, never negative
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Countdown {
    remaining_seconds: u64,
}

impl Countdown {
    /// Countdown from `now` until `expires_at`, clamped at zero
    ///
    /// Partial seconds are dropped, so a hold with 0.4 s left shows `0:00`
    /// but is not yet [`elapsed`](Self::is_elapsed).
    #[must_use]
    pub fn until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (expires_at - now).num_seconds();
        Self {
            remaining_seconds: u64::try_from(remaining).unwrap_or(0),
        }
    }

    /// Countdown for a fixed number of seconds
    #[must_use]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self {
            remaining_seconds: seconds,
        }
    }

    /// Whole seconds left
    #[must_use]
    pub const fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Whether the display has reached `0:00`
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.remaining_seconds == 0
    }
}

/// Renders as `m:ss`, e.g. `2:05`
impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }
}

/// Whether a hold expiring at `expires_at` has lapsed at `now`
#[must_use]
pub fn is_elapsed(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}
