use super::*;

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: 1,
            outbound_period_ms: 100,
            station_capabilities_id: 0x108,
            station_status_id: 0x109,
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            max_voltage: 350.0,
            min_voltage: 250.0,
            max_charge_current: 10.0,
            capacity_wh: 22_000,
            fast_charge_target_soc: 80,
            max_charging_time_scaling: 1.2,
        }
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        // CHAdeMO limits current request changes to 20 A/s
        Self {
            rate_amps: 20,
            interval_ms: 1000,
            cc_cv_margin_volts: 2.0,
            termination_current_amps: 5,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            bms_ttl_ms: 5000,
            station_ttl_ms: 2000,
            check_period_ms: 1000,
        }
    }
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            current_threshold_amps: 10.0,
            voltage_threshold_volts: 10.0,
            persist_ms: 5000,
        }
    }
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            termination: TerminationCondition::StopAtSoc,
            max_charging_minutes: 90,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/chademo.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
