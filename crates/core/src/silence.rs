//! Silence watchdog state machine.
//!
//! The watchdog itself performs no I/O. The relay polls it on a fixed
//! interval with the current time and the time of the last inbound audio,
//! and sends the prompt when [`SilenceWatchdog::observe`] says so.

use std::time::Duration;
use tokio::time::Instant;

/// How often the relay checks for silence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the caller may stay silent before being prompted.
pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_secs(3);

/// Text injected upstream when the caller has gone quiet.
pub const SILENCE_PROMPT: &str = "I cannot hear you. Did you say something? How can I help you?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Armed,
    Fired,
}

#[derive(Debug, Clone)]
pub struct SilenceWatchdog {
    state: WatchdogState,
    poll_interval: Duration,
    threshold: Duration,
}

impl Default for SilenceWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_SILENCE_THRESHOLD)
    }
}

impl SilenceWatchdog {
    pub fn new(poll_interval: Duration, threshold: Duration) -> Self {
        Self {
            state: WatchdogState::Armed,
            poll_interval,
            threshold,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Records one observation. Returns true exactly once: on the first call
    /// where the silence strictly exceeds the threshold.
    pub fn observe(&mut self, now: Instant, last_activity: Instant) -> bool {
        if self.state == WatchdogState::Fired {
            return false;
        }
        if now.saturating_duration_since(last_activity) > self.threshold {
            self.state = WatchdogState::Fired;
            return true;
        }
        false
    }
}
