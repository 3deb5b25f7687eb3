//! Reconnection policy.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// How hard the stream tries to heal after a session fails.
///
/// One failure starts a *sweep*: up to `max_attempts` consecutive connect
/// attempts. The first is immediate; each later one waits `delay` plus a
/// random extra of up to `jitter`, so many clients dropped at once do not
/// all come back in the same instant. A successful attempt ends the sweep,
/// and the next failure starts a fresh one.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Attempts per sweep before the stream gives up.
    pub max_attempts: u32,

    /// Fixed pause before every attempt but the first.
    pub delay: Duration,

    /// Upper bound of the random extra added to `delay`.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(250),
        }
    }
}

impl ReconnectConfig {
    /// Fixes values that would make the stream give up without trying.
    ///
    /// `max_attempts == 0` is raised to 1.
    pub fn validated(mut self) -> Self {
        if self.max_attempts == 0 {
            warn!("reconnect max_attempts is 0, using 1");
            self.max_attempts = 1;
        }
        self
    }

    /// Returns how long to wait before attempt number `attempt` (1-based)
    /// of a sweep.
    pub fn pause_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let max_extra = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        let extra = if max_extra == 0 {
            0
        } else {
            rand::rng().random_range(0..=max_extra)
        };
        self.delay + Duration::from_nanos(extra)
    }
}
