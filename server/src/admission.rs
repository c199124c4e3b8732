//! IP-based admission control
//!
//! Decides whether a freshly upgraded connection may proceed. Exactly one of
//! two policies is active per process:
//! - [`AdmissionPolicy::SingleSession`]: an address may hold at most one live
//!   session; the slot frees when that session closes.
//! - [`AdmissionPolicy::PermanentBlock`]: an address is admitted once for the
//!   lifetime of the process.

use clap::ValueEnum;
use log::{info, warn};
use shared::{PlayerId, CLOSE_IP_BLOCKED, CLOSE_IP_IN_USE};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdmissionPolicy {
    PermanentBlock,
    SingleSession,
}

/// Why a connection was refused, as reported to the client before closing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub code: u16,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(Denial),
}

#[derive(Debug)]
pub struct AdmissionController {
    policy: AdmissionPolicy,
    /// Every address ever admitted (permanent-block policy)
    seen: HashSet<IpAddr>,
    /// Address to the session occupying it (single-session policy)
    active: HashMap<IpAddr, PlayerId>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
            active: HashMap::new(),
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Admits `session` from `ip` or explains why not. An allowed session is
    /// recorded immediately.
    pub fn admit(&mut self, ip: IpAddr, session: PlayerId) -> Admission {
        match self.policy {
            AdmissionPolicy::PermanentBlock => {
                if !self.seen.insert(ip) {
                    warn!("Denied {}: address already used", ip);
                    return Admission::Deny(Denial {
                        code: CLOSE_IP_BLOCKED,
                        reason: "ip blocked",
                    });
                }
            }
            AdmissionPolicy::SingleSession => {
                if let Some(existing) = self.active.get(&ip) {
                    warn!("Denied {}: session {} still active", ip, existing);
                    return Admission::Deny(Denial {
                        code: CLOSE_IP_IN_USE,
                        reason: "ip already has an active session",
                    });
                }
                self.active.insert(ip, session);
            }
        }

        info!("Admitted session {} from {}", session, ip);
        Admission::Allow
    }

    /// Frees the slot held by `session`. Only the session that claimed the
    /// slot can release it. Returns true if a slot was freed.
    pub fn release(&mut self, ip: IpAddr, session: PlayerId) -> bool {
        match self.policy {
            AdmissionPolicy::PermanentBlock => false,
            AdmissionPolicy::SingleSession => {
                if self.active.get(&ip) == Some(&session) {
                    self.active.remove(&ip);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active.len()
    }
}

/// Resolves the address a connection is admitted under.
///
/// Uses the first entry of an `X-Forwarded-For` header when it parses as an
/// IP address, else the transport peer. IPv4-mapped IPv6 addresses are
/// reduced to plain IPv4.
pub fn client_ip(forwarded_for: Option<&str>, peer: SocketAddr) -> IpAddr {
    let forwarded = forwarded_for
        .and_then(|header| header.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.unwrap_or_else(|| peer.ip()).to_canonical()
}
