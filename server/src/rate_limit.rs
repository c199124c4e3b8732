//! Per-connection inbound message throttling
//!
//! Each connection owns one [`RateLimiter`]. Messages are counted inside a
//! fixed window that restarts once it is at least `window` old. The first
//! message over the limit is fatal to the connection; there is no warning
//! state.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_messages: u32,
    window: Duration,
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_messages: u32, window: Duration, now: Instant) -> Self {
        Self {
            max_messages,
            window,
            window_start: now,
            count: 0,
        }
    }

    /// Counts one inbound message received at `now`.
    ///
    /// Returns false once the current window holds more than `max_messages`;
    /// every later call inside the same window also returns false.
    pub fn record(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        self.count <= self.max_messages
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
