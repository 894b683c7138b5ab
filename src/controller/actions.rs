use super::{Action, ChargeController, State};
use crate::hal::OutputLine;
use std::time::{Duration, Instant};

impl ChargeController {
    /// Drive an output; only actual level changes become actions
    pub(super) fn set_output(&mut self, line: OutputLine, active: bool) {
        if self.outputs.get(line) == active {
            return;
        }
        self.outputs.set(line, active);
        self.logger.debug(&format!(
            "{} {}",
            if active { "Asserting" } else { "Deasserting" },
            line
        ));
        self.pending.push(Action::SetOutput(line, active));
    }

    /// Tell the station the vehicle is ready: status flag and line together
    pub(super) fn signal_go_ahead(&mut self) {
        self.session.status.charging_enabled = true;
        self.session.status.requesting_stop = false;
        self.set_output(OutputLine::ChargeEnable, true);
    }

    /// Tell the station to stop: status flags and line together
    pub(super) fn initiate_shutdown(&mut self) {
        self.session.status.charging_enabled = false;
        self.session.status.requesting_stop = true;
        self.set_output(OutputLine::ChargeEnable, false);
    }

    pub(super) fn start_transmission(&mut self) {
        if !self.transmitting {
            self.transmitting = true;
            self.pending.push(Action::StartTransmission);
        }
    }

    pub(super) fn stop_transmission(&mut self) {
        if self.transmitting {
            self.transmitting = false;
            self.pending.push(Action::StopTransmission);
        }
    }

    pub(super) fn start_station_liveness(&mut self, now: Instant) {
        if !self.station_liveness.is_armed() {
            self.station_liveness.arm(now);
            self.pending.push(Action::StartStationLiveness);
        }
    }

    pub(super) fn stop_station_liveness(&mut self) {
        if self.station_liveness.is_armed() {
            self.station_liveness.disarm();
            self.pending.push(Action::StopStationLiveness);
        }
    }

    /// Move to `next`, enforcing which outputs may stay asserted there
    pub(super) fn transition(&mut self, next: State, reason: &str) {
        let from = self.session.state;
        if !next.permits_charge_enable() {
            self.session.status.charging_enabled = false;
            self.set_output(OutputLine::ChargeEnable, false);
        }
        if !next.permits_contactor() {
            self.set_output(OutputLine::ContactorPermit, false);
        }
        self.session.state = next;
        if from != next {
            self.logger.info(&format!(
                "Switching to state: {} (from {}), reason: {}",
                next, from, reason
            ));
        }
    }

    /// Fatal path: withdraw everything, then enter Error
    pub(super) fn fail_session(&mut self, reason: &str) {
        self.logger.error(&format!("Charging session failed: {}", reason));
        self.initiate_shutdown();
        self.session.status.system_fault = true;
        self.stop_transmission();
        self.stop_station_liveness();
        self.set_output(OutputLine::ContactorPermit, false);
        self.transition(State::Error, reason);
    }

    /// Give up on a session that never reached energy transfer
    pub(super) fn abort_session(&mut self, next: State, reason: &str) {
        self.initiate_shutdown();
        self.stop_transmission();
        self.stop_station_liveness();
        self.transition(next, reason);
    }

    /// Stop charging from energy transfer; contactors stay until current falls
    pub(super) fn wind_down(&mut self, reason: &str) {
        self.initiate_shutdown();
        self.transition(State::WindingDown, reason);
    }

    /// Fresh session fields, same identity and state
    pub(super) fn reinitialise_session(&mut self) {
        let state = self.session.state;
        self.session.reinitialise(&self.config, &self.battery);
        self.session.state = state;
    }

    /// Plug gone: everything off, everything forgotten
    pub(super) fn reset_session(&mut self, reason: &str) {
        self.set_output(OutputLine::ChargeEnable, false);
        self.set_output(OutputLine::ContactorPermit, false);
        self.stop_transmission();
        self.stop_station_liveness();
        self.station.reinitialise();
        self.reinitialise_session();
        self.transition(State::Idle, reason);
    }

    /// Ramp the request during energy transfer and refresh the time estimate
    pub(super) fn recompute_request(&mut self, now: Instant) {
        let next = self
            .ramp
            .recompute(&self.session, &self.battery, &self.station, now);
        if next != self.session.requested_current {
            self.logger.debug(&format!(
                "Requested current {} A -> {} A",
                self.session.requested_current, next
            ));
        }
        self.session.set_requested_current(next, now);
        self.session
            .recalculate_charging_time(&self.battery, self.config.battery.max_charging_time_scaling);
    }

    /// Ramp the request toward zero
    pub(super) fn ramp_down(&mut self, now: Instant) {
        let next = self.ramp.wind_down(&self.session, now);
        self.session.set_requested_current(next, now);
    }

    /// Feed output deviation trackers; returns the reason if one just latched
    pub(super) fn track_deviation(&mut self, now: Instant) -> Option<&'static str> {
        let cfg = &self.config.deviation;
        let persist = Duration::from_millis(cfg.persist_ms);

        let current_gap = (f32::from(self.session.requested_current)
            - f32::from(self.station.output_current))
        .abs();
        let current_latched = self.session.current_deviation.update(
            current_gap > cfg.current_threshold_amps,
            persist,
            now,
        );

        // Without a shunt reading there is nothing to compare against
        let voltage_deviating = self.battery.measured_voltage > 0.0
            && (f32::from(self.station.output_voltage) - self.battery.measured_voltage).abs()
                > cfg.voltage_threshold_volts;
        let voltage_latched = self
            .session
            .voltage_deviation
            .update(voltage_deviating, persist, now);

        if current_latched {
            Some("current deviation")
        } else if voltage_latched {
            Some("voltage deviation")
        } else {
            None
        }
    }
}
