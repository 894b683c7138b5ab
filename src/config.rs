//! Configuration management for the charge controller
//!
//! This module handles loading, validation, and management of the controller
//! configuration from YAML files. Every threshold the state machine, ramp
//! controller and liveness supervisors rely on lives here rather than in the
//! code that uses it.

use crate::error::{ChademoError, Result};
use crate::session::TerminationCondition;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CHAdeMO protocol parameters and message identifiers
    pub protocol: ProtocolConfig,

    /// Rated battery parameters used until the BMS reports
    pub battery: BatteryConfig,

    /// Current ramp limits
    pub ramp: RampConfig,

    /// Peer liveness windows
    pub liveness: LivenessConfig,

    /// Output deviation detection
    pub deviation: DeviationConfig,

    /// Session termination policy
    pub charging: ChargingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// CHAdeMO protocol parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Protocol version we announce in 0x102 (1 == v0.9, 2 == v1.0)
    pub version: u8,

    /// Period of the outbound 0x100/0x101/0x102 burst in milliseconds
    pub outbound_period_ms: u64,

    /// Station capabilities message id
    pub station_capabilities_id: u32,

    /// Station status message id
    pub station_status_id: u32,
}

/// Rated battery parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Pack voltage at which the battery counts as full (V)
    pub max_voltage: f32,

    /// Pack voltage of an empty battery (V)
    pub min_voltage: f32,

    /// Charge current limit assumed until the BMS reports one (A)
    pub max_charge_current: f32,

    /// Rated capacity (Wh)
    pub capacity_wh: u32,

    /// State of charge at which fast charging stops by default (%)
    pub fast_charge_target_soc: u8,

    /// Scaling applied to the estimated charging time to get the maximum
    pub max_charging_time_scaling: f32,
}

/// Current ramp limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Largest permitted change of the current request per interval (A)
    pub rate_amps: u8,

    /// Interval the ramp rate applies to (ms)
    pub interval_ms: u64,

    /// Window below target voltage treated as constant-voltage (V)
    pub cc_cv_margin_volts: f32,

    /// Output current at or below which contactors may open (A)
    pub termination_current_amps: u8,
}

/// Peer liveness windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// BMS time-to-live (ms)
    pub bms_ttl_ms: u64,

    /// Station time-to-live (ms); shorter than the BMS one
    pub station_ttl_ms: u64,

    /// Period of each supervisor's check (ms)
    pub check_period_ms: u64,
}

/// Output deviation detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviationConfig {
    /// Allowed gap between requested and delivered current (A)
    pub current_threshold_amps: f32,

    /// Allowed gap between station output and shunt voltage (V)
    pub voltage_threshold_volts: f32,

    /// How long a deviation must persist before it latches (ms)
    pub persist_ms: u64,
}

/// Session termination policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingConfig {
    /// What ends energy transfer besides a full battery
    pub termination: TerminationCondition,

    /// Energy transfer limit for time-based termination (minutes)
    pub max_charging_minutes: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "chademo_config.yaml",
            "/data/chademo_config.yaml",
            "/etc/chademo/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                let config = Self::from_file(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.protocol.version == 0 {
            return Err(ChademoError::validation(
                "protocol.version",
                "Must be greater than 0",
            ));
        }

        if self.protocol.outbound_period_ms == 0 {
            return Err(ChademoError::validation(
                "protocol.outbound_period_ms",
                "Must be greater than 0",
            ));
        }

        // Battery
        if self.battery.min_voltage >= self.battery.max_voltage {
            return Err(ChademoError::validation(
                "battery.min_voltage",
                "Must be below battery.max_voltage",
            ));
        }

        if !(1..=100).contains(&self.battery.fast_charge_target_soc) {
            return Err(ChademoError::validation(
                "battery.fast_charge_target_soc",
                "Must be within 1..=100",
            ));
        }

        if self.battery.max_charging_time_scaling < 1.0 {
            return Err(ChademoError::validation(
                "battery.max_charging_time_scaling",
                "Must be at least 1.0",
            ));
        }

        // Ramp
        if self.ramp.rate_amps == 0 {
            return Err(ChademoError::validation(
                "ramp.rate_amps",
                "Must be greater than 0",
            ));
        }

        if self.ramp.interval_ms == 0 {
            return Err(ChademoError::validation(
                "ramp.interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.ramp.cc_cv_margin_volts < 0.0 {
            return Err(ChademoError::validation(
                "ramp.cc_cv_margin_volts",
                "Must not be negative",
            ));
        }

        // Liveness
        if self.liveness.bms_ttl_ms == 0 || self.liveness.station_ttl_ms == 0 {
            return Err(ChademoError::validation(
                "liveness",
                "TTLs must be greater than 0",
            ));
        }

        if self.liveness.station_ttl_ms >= self.liveness.bms_ttl_ms {
            return Err(ChademoError::validation(
                "liveness.station_ttl_ms",
                "Must be shorter than liveness.bms_ttl_ms",
            ));
        }

        if self.liveness.check_period_ms == 0 {
            return Err(ChademoError::validation(
                "liveness.check_period_ms",
                "Must be greater than 0",
            ));
        }

        if matches!(self.charging.termination, TerminationCondition::StopAtTime)
            && self.charging.max_charging_minutes == 0
        {
            return Err(ChademoError::validation(
                "charging.max_charging_minutes",
                "Must be greater than 0 for stop_at_time",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)
            .map_err(|_| ChademoError::validation("logging.level", "Unknown log level"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.protocol.version, 1);
        assert_eq!(config.protocol.outbound_period_ms, 100);
        assert_eq!(config.ramp.rate_amps, 20);
        assert_eq!(config.ramp.interval_ms, 1000);
        assert!(config.liveness.station_ttl_ms < config.liveness.bms_ttl_ms);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.ramp.rate_amps = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.liveness.station_ttl_ms = config.liveness.bms_ttl_ms;
        assert!(config.validate().is_err());

        config = Config::default();
        config.battery.fast_charge_target_soc = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.ramp.rate_amps, deserialized.ramp.rate_amps);
        assert_eq!(
            config.charging.termination,
            deserialized.charging.termination
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("ramp:\n  rate_amps: 5\n").unwrap();
        assert_eq!(config.ramp.rate_amps, 5);
        assert_eq!(config.ramp.interval_ms, 1000);
        assert_eq!(config.liveness.bms_ttl_ms, 5000);
    }
}
