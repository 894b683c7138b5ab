//! Battery snapshot
//!
//! Latest values reported by the BMS on the main bus. The codec is the only
//! writer; everything else reads.

use crate::config::BatteryConfig;
use serde::Serialize;
use std::time::Instant;

/// BMS alarm and warning flags from the alarm message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatteryAlarms {
    pub high_cell_alarm: bool,
    pub low_cell_alarm: bool,
    pub high_temp_alarm: bool,
    pub low_temp_alarm: bool,
    pub cell_delta_alarm: bool,
    pub high_cell_warn: bool,
    pub low_cell_warn: bool,
    pub high_temp_warn: bool,
    pub low_temp_warn: bool,
}

/// Latest battery values reported by the BMS
#[derive(Debug, Clone)]
pub struct BatterySnapshot {
    /// Raw state of charge (%); may exceed 100 on the wire
    pub state_of_charge: u16,
    /// Maximum pack voltage (V)
    pub maximum_voltage: f32,
    /// Minimum pack voltage (V)
    pub minimum_voltage: f32,
    /// Maximum charge current (A)
    pub maximum_charge_current: f32,
    /// Maximum discharge current (A)
    pub maximum_discharge_current: f32,
    /// Instantaneous pack voltage (V)
    pub voltage: f32,
    /// Shunt-measured pack voltage (V)
    pub measured_voltage: f32,
    /// Pack current (A); negative while discharging
    pub current: f32,
    /// Hottest cell temperature (C)
    pub temperature: f32,
    pub alarms: BatteryAlarms,
    /// Rated pack voltage at which the battery counts as full (V)
    pub rated_max_voltage: f32,
    /// Rated capacity (Wh)
    pub capacity_wh: u32,
    /// When the BMS was last heard from
    pub last_seen: Option<Instant>,
}

impl BatterySnapshot {
    /// Snapshot seeded with rated values until the BMS reports
    pub fn new(config: &BatteryConfig) -> Self {
        Self {
            state_of_charge: 0,
            maximum_voltage: config.max_voltage,
            minimum_voltage: config.min_voltage,
            maximum_charge_current: config.max_charge_current,
            maximum_discharge_current: 0.0,
            voltage: 0.0,
            measured_voltage: 0.0,
            current: 0.0,
            temperature: 0.0,
            alarms: BatteryAlarms::default(),
            rated_max_voltage: config.max_voltage,
            capacity_wh: config.capacity_wh,
            last_seen: None,
        }
    }

    /// Record that a BMS frame arrived
    pub fn heartbeat(&mut self, now: Instant) {
        self.last_seen = Some(now);
    }

    /// State of charge clamped to 0..=100
    pub fn soc(&self) -> u8 {
        self.state_of_charge.min(100) as u8
    }

    pub fn is_full(&self) -> bool {
        self.alarms.high_cell_alarm || self.voltage >= self.rated_max_voltage || self.soc() >= 100
    }

    pub fn is_too_hot(&self) -> bool {
        self.alarms.high_temp_alarm
    }

    pub fn is_too_cold(&self) -> bool {
        self.alarms.low_temp_alarm || self.alarms.low_temp_warn
    }

    /// Whether any battery condition forbids charging
    pub fn charge_inhibited(&self) -> bool {
        self.is_full() || self.is_too_hot() || self.is_too_cold()
    }

    /// Human-readable cause of an inhibit, for log lines
    pub fn inhibit_reason(&self) -> Option<&'static str> {
        if self.is_full() {
            Some("battery full")
        } else if self.is_too_hot() {
            Some("battery too hot")
        } else if self.is_too_cold() {
            Some("battery too cold")
        } else {
            None
        }
    }

    /// Pack voltage expected at the given state of charge
    ///
    /// Linear between the minimum and maximum pack voltage; good enough for
    /// charging time estimates.
    pub fn voltage_from_soc(&self, soc: u8) -> f32 {
        let soc = f32::from(soc.min(100));
        self.minimum_voltage + (self.maximum_voltage - self.minimum_voltage) * soc / 100.0
    }

    /// Charge current limit as a whole-amp request ceiling
    pub fn charge_current_limit(&self) -> u8 {
        self.maximum_charge_current.clamp(0.0, f32::from(u8::MAX)) as u8
    }

    /// Capacity as transmitted in 0x101 (units of 0.11 kWh)
    pub fn scaled_capacity(&self) -> u16 {
        let kwh = self.capacity_wh as f32 / 1000.0;
        (kwh / 0.11).round().clamp(0.0, f32::from(u16::MAX)) as u16
    }
}
