//! Current request ramp controller
//!
//! Moves the requested current toward the lesser of the BMS limit and the
//! station's available current, never faster than the configured rate.

use crate::battery::BatterySnapshot;
use crate::config::RampConfig;
use crate::session::ChargingSession;
use crate::station::StationSnapshot;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Charging regime derived from the station's output voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Below target by more than the margin
    ConstantCurrent,
    /// Within the margin below target
    ConstantVoltage,
    /// Above target
    OverTarget,
}

#[derive(Debug, Clone)]
pub struct RampController {
    rate: u8,
    interval: Duration,
    margin: f32,
}

impl RampController {
    pub fn new(config: &RampConfig) -> Self {
        Self {
            rate: config.rate_amps,
            interval: Duration::from_millis(config.interval_ms),
            margin: config.cc_cv_margin_volts,
        }
    }

    pub fn phase(&self, output_voltage: u16, target_voltage: u16) -> Phase {
        let output = f32::from(output_voltage);
        let target = f32::from(target_voltage);
        if output > target {
            Phase::OverTarget
        } else if output < target - self.margin {
            Phase::ConstantCurrent
        } else {
            Phase::ConstantVoltage
        }
    }

    /// Lesser of the BMS charge limit and the station's available current
    pub fn ceiling(battery: &BatterySnapshot, station: &StationSnapshot) -> u8 {
        battery.charge_current_limit().min(station.available_current)
    }

    /// A rate-limited step is allowed once per interval
    fn step_due(&self, session: &ChargingSession, now: Instant) -> bool {
        session
            .last_current_change
            .is_none_or(|t| now.saturating_duration_since(t) >= self.interval)
    }

    /// Next requested current during energy transfer
    pub fn recompute(
        &self,
        session: &ChargingSession,
        battery: &BatterySnapshot,
        station: &StationSnapshot,
        now: Instant,
    ) -> u8 {
        let current = session.requested_current;
        let ceiling = Self::ceiling(battery, station);

        match self.phase(station.output_voltage, session.target_voltage) {
            Phase::OverTarget => current.saturating_sub(1),
            _ if !self.step_due(session, now) => current,
            Phase::ConstantCurrent => {
                if current < ceiling {
                    current.saturating_add(self.rate).min(ceiling)
                } else {
                    current.saturating_sub(self.rate).max(ceiling)
                }
            }
            Phase::ConstantVoltage => {
                if current > ceiling {
                    current.saturating_sub(self.rate).max(ceiling)
                } else {
                    current
                }
            }
        }
    }

    /// Next requested current once shutdown has begun
    pub fn wind_down(&self, session: &ChargingSession, now: Instant) -> u8 {
        if self.step_due(session, now) {
            session.requested_current.saturating_sub(self.rate)
        } else {
            session.requested_current
        }
    }
}
