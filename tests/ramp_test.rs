//! Ramp controller properties

use chademo_ctl::battery::BatterySnapshot;
use chademo_ctl::config::Config;
use chademo_ctl::ramp::{Phase, RampController};
use chademo_ctl::session::ChargingSession;
use chademo_ctl::station::StationSnapshot;
use proptest::prelude::*;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Step {
    after_ms: u64,
    bms_limit: f32,
    available: u8,
    output_voltage: u16,
}

fn arb_step() -> impl Strategy<Value = Step> {
    (0u64..=2500, 0.0f32..=300.0, 0u8..=200, 200u16..=400).prop_map(
        |(after_ms, bms_limit, available, output_voltage)| Step {
            after_ms,
            bms_limit,
            available,
            output_voltage,
        },
    )
}

fn fixture() -> (Config, RampController, ChargingSession, BatterySnapshot, StationSnapshot) {
    let config = Config::default();
    let battery = BatterySnapshot::new(&config.battery);
    let session = ChargingSession::new(&config, &battery);
    (
        config.clone(),
        RampController::new(&config.ramp),
        session,
        battery,
        StationSnapshot::default(),
    )
}

#[test]
fn scenario_request_drops_to_ceiling_in_one_step() {
    let (_, ramp, mut session, mut battery, mut station) = fixture();
    let t0 = Instant::now();
    session.set_requested_current(20, t0);
    battery.maximum_charge_current = 10.0;
    station.available_current = 100;
    station.output_voltage = 300;

    let next = ramp.recompute(&session, &battery, &station, t0 + Duration::from_millis(1000));
    assert_eq!(next, 10);
}

proptest! {
    /// Outside the over-target backoff, the request moves at most one rate
    /// step per interval and never rises above the ceiling.
    #[test]
    fn request_respects_rate_and_ceiling(steps in proptest::collection::vec(arb_step(), 1..60)) {
        let (config, ramp, mut session, mut battery, mut station) = fixture();
        let rate = config.ramp.rate_amps;
        let interval = Duration::from_millis(config.ramp.interval_ms);
        let mut now = Instant::now();

        for step in steps {
            now += Duration::from_millis(step.after_ms);
            battery.maximum_charge_current = step.bms_limit;
            station.available_current = step.available;
            station.output_voltage = step.output_voltage;

            let before = session.requested_current;
            let last_change = session.last_current_change;
            let ceiling = RampController::ceiling(&battery, &station);
            let phase = ramp.phase(station.output_voltage, session.target_voltage);
            let next = ramp.recompute(&session, &battery, &station, now);

            match phase {
                Phase::OverTarget => prop_assert_eq!(next, before.saturating_sub(1)),
                Phase::ConstantVoltage => prop_assert!(next <= before),
                Phase::ConstantCurrent => {}
            }
            if next != before && phase != Phase::OverTarget {
                prop_assert!(before.abs_diff(next) <= rate);
                if let Some(t) = last_change {
                    prop_assert!(now.duration_since(t) >= interval);
                }
            }
            if next > before {
                prop_assert!(next <= ceiling);
            }

            session.set_requested_current(next, now);
        }
    }

    /// Winding down never raises the request and reaches zero
    #[test]
    fn wind_down_is_monotonic(start in 0u8..=255, gaps in proptest::collection::vec(0u64..=2000, 1..40)) {
        let (config, ramp, mut session, _, _) = fixture();
        let mut now = Instant::now();
        session.set_requested_current(start, now);

        for gap in gaps {
            now += Duration::from_millis(gap);
            let before = session.requested_current;
            let next = ramp.wind_down(&session, now);
            prop_assert!(next <= before);
            prop_assert!(before - next <= config.ramp.rate_amps);
            session.set_requested_current(next, now);
        }

        // Enough whole intervals always get there
        for _ in 0..13 {
            now += Duration::from_millis(config.ramp.interval_ms);
            let next = ramp.wind_down(&session, now);
            session.set_requested_current(next, now);
        }
        prop_assert_eq!(session.requested_current, 0);
    }

    /// Raw state of charge at or above 100 always reads as full
    #[test]
    fn saturated_soc_is_full(raw in 100u16..=u16::MAX) {
        let config = Config::default();
        let mut battery = BatterySnapshot::new(&config.battery);
        battery.state_of_charge = raw;
        prop_assert_eq!(battery.soc(), 100);
        prop_assert!(battery.is_full());
    }
}
