//! Station snapshot
//!
//! Capability and status values reported by the charging station on the
//! CHAdeMO bus.

use serde::Serialize;
use std::time::Instant;

/// Status bits of the station status message (byte 5)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StationFlags {
    /// Station is energising the output
    pub charging: bool,
    pub malfunction: bool,
    pub connector_locked: bool,
    pub battery_incompatible: bool,
    pub system_malfunction: bool,
    /// Station asks the vehicle to stop
    pub stop_control: bool,
}

/// Latest values reported by the charging station
#[derive(Debug, Clone, Default)]
pub struct StationSnapshot {
    // Capabilities
    pub weld_detection: bool,
    pub max_available_voltage: u16,
    pub available_current: u8,
    pub threshold_voltage: u16,

    // Status
    pub protocol_number: u8,
    pub output_voltage: u16,
    pub output_current: u8,
    pub flags: StationFlags,
    /// Remaining time in seconds (wire unit is 10 s)
    pub remaining_seconds: u16,
    pub remaining_minutes: u8,

    pub last_seen: Option<Instant>,
}

impl StationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a station frame arrived
    pub fn heartbeat(&mut self, now: Instant) {
        self.last_seen = Some(now);
    }

    /// Forget everything a previous session reported
    ///
    /// The heartbeat is kept; liveness is armed separately.
    pub fn reinitialise(&mut self) {
        *self = Self {
            last_seen: self.last_seen,
            ..Self::default()
        };
    }

    /// Initial parameter exchange finished
    pub fn handshake_complete(&self) -> bool {
        self.protocol_number != 0
            && self.max_available_voltage != 0
            && self.available_current != 0
            && !self.flags.battery_incompatible
    }

    /// Station can reach the given pack voltage
    pub fn voltage_sufficient(&self, required: f32) -> bool {
        f32::from(self.max_available_voltage) >= required
    }

    pub fn reporting_malfunction(&self) -> bool {
        self.flags.malfunction || self.flags.battery_incompatible || self.flags.system_malfunction
    }

    /// Station speaks an older protocol than we announce
    pub fn protocol_mismatch(&self, ours: u8) -> bool {
        self.protocol_number != 0 && self.protocol_number < ours
    }

    pub fn requesting_stop(&self) -> bool {
        self.flags.stop_control
    }

    pub fn connector_locked(&self) -> bool {
        self.flags.connector_locked
    }
}
