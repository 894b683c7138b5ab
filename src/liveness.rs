//! Peer liveness supervision
//!
//! A peer is alive while its last frame is younger than its time-to-live.
//! Supervisors are evaluated from a periodic timer; the controller turns a
//! failed check into a liveness event.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// The two peers the controller listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Peer {
    Bms,
    Station,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Bms => write!(f, "BMS"),
            Peer::Station => write!(f, "station"),
        }
    }
}

/// `now - last_seen < ttl`; a peer never heard from is not alive
pub fn is_alive(last_seen: Option<Instant>, ttl: Duration, now: Instant) -> bool {
    last_seen.is_some_and(|seen| now.saturating_duration_since(seen) < ttl)
}

/// Liveness check for one peer
///
/// The arming time counts as a sighting, so a peer gets a full TTL after
/// supervision starts before it can be declared dead.
#[derive(Debug, Clone)]
pub struct LivenessSupervisor {
    peer: Peer,
    ttl: Duration,
    armed_at: Option<Instant>,
}

impl LivenessSupervisor {
    pub fn new(peer: Peer, ttl: Duration) -> Self {
        Self {
            peer,
            ttl,
            armed_at: None,
        }
    }

    pub fn peer(&self) -> Peer {
        self.peer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start supervising; re-arming an armed supervisor keeps the first time
    pub fn arm(&mut self, now: Instant) {
        self.armed_at.get_or_insert(now);
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Evaluate the peer; a disarmed supervisor always reports alive
    pub fn check(&self, last_seen: Option<Instant>, now: Instant) -> bool {
        match self.armed_at {
            None => true,
            Some(armed_at) => {
                let reference = last_seen.map_or(armed_at, |seen| seen.max(armed_at));
                is_alive(Some(reference), self.ttl, now)
            }
        }
    }
}
