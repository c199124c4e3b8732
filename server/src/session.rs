//! Per-connection session record
//!
//! Owned by the connection's handler task, never shared. Fields mutated by
//! other contexts (liveness) live in the shared [`ConnectionRegistry`]
//! instead.
//!
//! [`ConnectionRegistry`]: crate::broadcast::ConnectionRegistry

use crate::config::RateLimitConfig;
use crate::rate_limit::RateLimiter;
use shared::PlayerId;
use std::net::IpAddr;
use std::time::Instant;

#[derive(Debug)]
pub struct Session {
    pub id: PlayerId,
    pub ip: IpAddr,
    rate_limiter: RateLimiter,
}

impl Session {
    pub fn new(id: PlayerId, ip: IpAddr, limits: RateLimitConfig, now: Instant) -> Self {
        Self {
            id,
            ip,
            rate_limiter: RateLimiter::new(limits.max_messages, limits.window, now),
        }
    }

    /// Counts an inbound frame; false means the connection must be closed
    pub fn accept_message(&mut self, now: Instant) -> bool {
        self.rate_limiter.record(now)
    }

    pub fn message_count(&self) -> u32 {
        self.rate_limiter.count()
    }
}
