//! Charging session
//!
//! Session-scoped fields owned by the controller: the current request and its
//! rate-limit timestamp, targets, the vehicle status flags sent to the
//! station, deviation tracking and the charging time estimate.

use crate::battery::BatterySnapshot;
use crate::config::Config;
use crate::controller::State;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What ends energy transfer besides a full or hot battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCondition {
    /// Stop once the target state of charge is reached
    StopAtSoc,
    /// Stop once the pack reaches the target voltage
    StopAtVoltage,
    /// Stop after the configured maximum charging time
    StopAtTime,
}

/// Vehicle status flags transmitted to the station in 0x102
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VehicleStatus {
    pub charging_enabled: bool,
    pub not_in_park: bool,
    pub system_fault: bool,
    pub requesting_stop: bool,
}

/// Tracks how long a measured value has been off its expected value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviationTracker {
    since: Option<Instant>,
    latched: bool,
}

impl DeviationTracker {
    /// Feed one observation; returns true on the observation that latches
    pub fn update(&mut self, deviating: bool, persist: Duration, now: Instant) -> bool {
        if self.latched {
            return false;
        }
        if !deviating {
            self.since = None;
            return false;
        }
        let since = *self.since.get_or_insert(now);
        if now.saturating_duration_since(since) >= persist {
            self.latched = true;
            return true;
        }
        false
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }
}

/// The one charging session of the controller
#[derive(Debug, Clone)]
pub struct ChargingSession {
    id: Uuid,
    pub state: State,
    /// Current requested from the station (A)
    pub requested_current: u8,
    /// When `requested_current` last changed
    pub last_current_change: Option<Instant>,
    /// Pack voltage at the target state of charge (V)
    pub target_voltage: u16,
    /// Target state of charge (%)
    pub target_soc: u8,
    pub status: VehicleStatus,
    pub current_deviation: DeviationTracker,
    pub voltage_deviation: DeviationTracker,
    pub termination: TerminationCondition,
    /// Limit for time-based termination
    pub max_charging_time: Duration,
    /// Estimated minutes to reach the target
    pub charging_time_minutes: u8,
    /// Estimated minutes scaled by the configured factor
    pub charging_time_minutes_max: u8,
    /// Entry into energy transfer
    pub energy_transfer_started: Option<Instant>,
}

impl ChargingSession {
    pub fn new(config: &Config, battery: &BatterySnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: State::Idle,
            requested_current: 0,
            last_current_change: None,
            target_voltage: battery
                .voltage_from_soc(config.battery.fast_charge_target_soc)
                .round()
                .clamp(0.0, f32::from(u16::MAX)) as u16,
            target_soc: config.battery.fast_charge_target_soc,
            status: VehicleStatus::default(),
            current_deviation: DeviationTracker::default(),
            voltage_deviation: DeviationTracker::default(),
            termination: config.charging.termination,
            max_charging_time: Duration::from_secs(
                u64::from(config.charging.max_charging_minutes) * 60,
            ),
            charging_time_minutes: 0,
            charging_time_minutes_max: 0,
            energy_transfer_started: None,
        }
    }

    /// Reset every field except the identity
    pub fn reinitialise(&mut self, config: &Config, battery: &BatterySnapshot) {
        let id = self.id;
        *self = Self::new(config, battery);
        self.id = id;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Update the current request, stamping the change time if it moved
    pub fn set_requested_current(&mut self, amps: u8, now: Instant) {
        if amps != self.requested_current {
            self.requested_current = amps;
            self.last_current_change = Some(now);
        }
    }

    /// Whether the configured termination condition has been met
    pub fn termination_reached(&self, battery: &BatterySnapshot, now: Instant) -> bool {
        match self.termination {
            TerminationCondition::StopAtSoc => battery.soc() >= self.target_soc,
            TerminationCondition::StopAtVoltage => battery.voltage >= f32::from(self.target_voltage),
            TerminationCondition::StopAtTime => self
                .energy_transfer_started
                .is_some_and(|t| now.saturating_duration_since(t) >= self.max_charging_time),
        }
    }

    /// Re-estimate the time to reach the target state of charge
    ///
    /// Uses the pack voltage halfway between the present and target state of
    /// charge. Left unchanged while no current is requested.
    pub fn recalculate_charging_time(&mut self, battery: &BatterySnapshot, scaling: f32) {
        let soc = battery.soc();
        let target = self.target_soc.max(soc);
        let remaining_wh = battery.capacity_wh as f32 * f32::from(target - soc) / 100.0;
        let midpoint = ((u16::from(soc) + u16::from(target)) / 2) as u8;
        let watts = f32::from(self.requested_current) * battery.voltage_from_soc(midpoint);
        if watts <= 0.0 {
            return;
        }

        let minutes = (remaining_wh / watts * 60.0).round().clamp(0.0, 254.0);
        self.charging_time_minutes = minutes as u8;
        self.charging_time_minutes_max = (minutes * scaling).round().clamp(0.0, 255.0) as u8;
    }

    /// Battery status byte of 0x102
    pub fn battery_status_byte(&self, battery: &BatterySnapshot) -> u8 {
        let mut byte = 0u8;
        if battery.alarms.high_cell_alarm {
            byte |= 1 << 0;
        }
        if battery.alarms.low_cell_alarm {
            byte |= 1 << 1;
        }
        if self.current_deviation.is_latched() {
            byte |= 1 << 2;
        }
        if battery.alarms.high_temp_alarm {
            byte |= 1 << 3;
        }
        if self.voltage_deviation.is_latched() {
            byte |= 1 << 4;
        }
        byte
    }

    /// Vehicle status byte of 0x102; bit 3 is set while contactors are open
    pub fn vehicle_status_byte(&self, contactors_open: bool) -> u8 {
        let mut byte = 0u8;
        if self.status.charging_enabled {
            byte |= 1 << 0;
        }
        if self.status.not_in_park {
            byte |= 1 << 1;
        }
        if self.status.system_fault {
            byte |= 1 << 2;
        }
        if contactors_open {
            byte |= 1 << 3;
        }
        if self.status.requesting_stop {
            byte |= 1 << 4;
        }
        byte
    }
}
