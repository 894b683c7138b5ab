use super::{ChargeController, Event, State};
use crate::hal::OutputLine;
use std::time::Instant;

impl ChargeController {
    /// Route an event to the handler of the active state
    pub(super) fn dispatch(&mut self, event: Event, now: Instant) {
        // Removing the plug ends any session, whatever the state
        if event == Event::PlugRemoved {
            self.reset_session("plug removed");
            return;
        }

        if matches!(event, Event::BmsLivenessFailed | Event::StationLivenessFailed) {
            self.on_liveness_failure(event);
            return;
        }

        match self.session.state {
            State::Idle => self.idle(event),
            State::PlugIn => self.plug_in(event, now),
            State::Handshaking => self.handshaking(event),
            State::AwaitConnectorLock => self.await_connector_lock(event),
            State::AwaitInsulationTest => self.await_insulation_test(event, now),
            State::EnergyTransfer => self.energy_transfer(event, now),
            State::WindingDown => self.winding_down(event, now),
            State::ChargeInhibited => self.charge_inhibited(event, now),
            State::Error => self.ignore(event),
        }
    }

    /// Unknown input never advances the session
    fn ignore(&self, event: Event) {
        let message = format!("Ignoring {:?} in state {}", event, self.session.state);
        match event {
            // These arrive at bus rate
            Event::BmsUpdateReceived
            | Event::StationCapabilitiesUpdated
            | Event::StationStatusUpdated => self.logger.debug(&message),
            _ => self.logger.warn(&message),
        }
    }

    fn on_liveness_failure(&mut self, event: Event) {
        let reason = if event == Event::BmsLivenessFailed {
            "communication timeout with BMS"
        } else {
            "communication timeout with station"
        };
        match self.session.state {
            state if state.liveness_fatal() => self.fail_session(reason),
            State::WindingDown => self
                .logger
                .warn(&format!("{} while winding down, already shutting down", reason)),
            _ => self.logger.debug(&format!(
                "{} in state {}, ignored",
                reason, self.session.state
            )),
        }
    }

    /// Battery condition or inhibit line forbids charging
    fn inhibit_reason(&self, event: Event) -> Option<&'static str> {
        match event {
            Event::ChargeInhibitEnabled => Some("charge inhibit signal"),
            Event::BmsUpdateReceived => self.battery.inhibit_reason(),
            _ => None,
        }
    }

    fn idle(&mut self, event: Event) {
        match event {
            Event::PlugInserted => {
                self.reinitialise_session();
                self.transition(State::PlugIn, "plug inserted");
            }
            Event::BmsUpdateReceived => {
                if let Some(reason) = self.inhibit_reason(event) {
                    self.transition(State::ChargeInhibited, reason);
                }
            }
            Event::ChargeInhibitEnabled => {
                self.initiate_shutdown();
                self.transition(State::ChargeInhibited, "charge inhibit signal");
            }
            _ => self.ignore(event),
        }
    }

    fn plug_in(&mut self, event: Event, now: Instant) {
        match event {
            Event::In1Activated => self.begin_handshake(now, "station activated IN1"),
            Event::BmsUpdateReceived => {
                if let Some(reason) = self.inhibit_reason(event) {
                    self.transition(State::ChargeInhibited, reason);
                }
            }
            Event::ChargeInhibitEnabled => {
                self.initiate_shutdown();
                self.transition(State::ChargeInhibited, "charge inhibit signal");
            }
            _ => self.ignore(event),
        }
    }

    fn handshaking(&mut self, event: Event) {
        match event {
            Event::StationCapabilitiesUpdated => {
                let required = self.battery.maximum_voltage;
                if !self.station.voltage_sufficient(required) {
                    self.fail_session(&format!(
                        "station maximum voltage {} V below required {} V",
                        self.station.max_available_voltage, required
                    ));
                } else if self.station.handshake_complete() {
                    self.transition(State::AwaitConnectorLock, "initial parameter exchange complete");
                    self.signal_go_ahead();
                }
            }
            Event::StationStatusUpdated => {
                let ours = self.config.protocol.version;
                if self.station.reporting_malfunction() {
                    self.fail_session("station reports malfunction or battery incompatibility");
                } else if self.station.protocol_mismatch(ours) {
                    self.fail_session(&format!(
                        "station protocol {} older than ours ({})",
                        self.station.protocol_number, ours
                    ));
                } else if self.station.handshake_complete() {
                    self.transition(State::AwaitConnectorLock, "initial parameter exchange complete");
                    self.signal_go_ahead();
                }
            }
            Event::In1Deactivated => self.abort_session(State::PlugIn, "station deactivated IN1"),
            Event::BmsUpdateReceived | Event::ChargeInhibitEnabled => {
                if let Some(reason) = self.inhibit_reason(event) {
                    self.abort_session(State::ChargeInhibited, reason);
                }
            }
            _ => self.ignore(event),
        }
    }

    fn await_connector_lock(&mut self, event: Event) {
        match event {
            Event::StationStatusUpdated => {
                if self.station.reporting_malfunction() {
                    self.fail_session("station reports malfunction");
                } else if self.station.connector_locked() {
                    self.transition(State::AwaitInsulationTest, "connector locked");
                }
            }
            Event::StationCapabilitiesUpdated => {}
            Event::In1Deactivated => self.abort_session(State::PlugIn, "station deactivated IN1"),
            Event::BmsUpdateReceived | Event::ChargeInhibitEnabled => {
                if let Some(reason) = self.inhibit_reason(event) {
                    self.abort_session(State::ChargeInhibited, reason);
                }
            }
            _ => self.ignore(event),
        }
    }

    fn await_insulation_test(&mut self, event: Event, now: Instant) {
        match event {
            Event::In2Activated => {
                self.transition(State::EnergyTransfer, "insulation test passed");
                self.session.energy_transfer_started = Some(now);
                self.set_output(OutputLine::ContactorPermit, true);
            }
            Event::StationStatusUpdated => {
                if self.station.reporting_malfunction() {
                    self.fail_session("station reports malfunction");
                }
            }
            Event::StationCapabilitiesUpdated => {}
            Event::In1Deactivated => self.abort_session(State::PlugIn, "station deactivated IN1"),
            Event::BmsUpdateReceived | Event::ChargeInhibitEnabled => {
                if let Some(reason) = self.inhibit_reason(event) {
                    self.abort_session(State::ChargeInhibited, reason);
                }
            }
            _ => self.ignore(event),
        }
    }

    fn energy_transfer(&mut self, event: Event, now: Instant) {
        match event {
            Event::BmsUpdateReceived => {
                if self.battery.is_full() {
                    self.wind_down("battery full");
                } else if self.battery.is_too_hot() {
                    self.wind_down("battery too hot");
                } else if self.session.termination_reached(&self.battery, now) {
                    self.wind_down("termination condition reached");
                } else {
                    self.recompute_request(now);
                }
            }
            Event::StationStatusUpdated => {
                if self.station.requesting_stop() {
                    self.wind_down("station requested stop");
                } else if self.station.reporting_malfunction() {
                    self.wind_down("station reports malfunction");
                } else if let Some(reason) = self.track_deviation(now) {
                    self.wind_down(reason);
                }
            }
            Event::StationCapabilitiesUpdated => self.recompute_request(now),
            Event::ChargeInhibitEnabled => self.wind_down("charge inhibit signal"),
            Event::In1Deactivated => self.wind_down("station deactivated IN1"),
            Event::In2Deactivated => self.wind_down("station deactivated IN2"),
            _ => self.ignore(event),
        }
    }

    fn winding_down(&mut self, event: Event, now: Instant) {
        match event {
            Event::BmsUpdateReceived | Event::StationCapabilitiesUpdated => self.ramp_down(now),
            Event::StationStatusUpdated => {
                self.ramp_down(now);
                let threshold = self.config.ramp.termination_current_amps;
                if self.outputs.contactor_permit && self.station.output_current <= threshold {
                    self.logger.info(&format!(
                        "Output current {} A at or below {} A, opening contactors",
                        self.station.output_current, threshold
                    ));
                    self.set_output(OutputLine::ContactorPermit, false);
                }
            }
            Event::In1Deactivated => {
                if !self.outputs.contactor_permit {
                    self.logger
                        .info("Station ended the session, stopping transmission");
                    self.stop_transmission();
                    self.stop_station_liveness();
                }
            }
            // Already shutting down
            Event::ChargeInhibitEnabled | Event::In2Deactivated => {}
            _ => self.ignore(event),
        }
    }

    /// Fresh station view and session, then start talking to the station
    fn begin_handshake(&mut self, now: Instant, reason: &str) {
        self.station.reinitialise();
        self.reinitialise_session();
        self.start_transmission();
        self.start_station_liveness(now);
        self.transition(State::Handshaking, reason);
    }

    fn charge_inhibited(&mut self, event: Event, now: Instant) {
        match event {
            Event::BmsUpdateReceived | Event::ChargeInhibitDisabled => {
                if self.battery.charge_inhibited() || self.inputs.charge_inhibit {
                    return;
                }
                if self.inputs.plug_present && self.inputs.in1 {
                    // No new IN1 edge will come; resume the handshake now
                    self.begin_handshake(now, "charge inhibit cleared with IN1 active");
                } else if self.inputs.plug_present {
                    self.transition(State::PlugIn, "charge inhibit cleared");
                } else {
                    self.transition(State::Idle, "charge inhibit cleared");
                }
            }
            Event::ChargeInhibitEnabled | Event::PlugInserted => {}
            _ => self.ignore(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Bus, CanFrame};
    use crate::config::Config;
    use crate::controller::Action;
    use std::time::Duration;

    fn to_handshaking() -> (ChargeController, Instant) {
        let now = Instant::now();
        let mut c = ChargeController::new(Config::default(), now);
        c.handle(Event::PlugInserted, now);
        c.handle(Event::In1Activated, now);
        assert_eq!(c.state(), State::Handshaking);
        (c, now)
    }

    fn capabilities(max_voltage: u16, current: u8) -> CanFrame {
        let v = max_voltage.to_le_bytes();
        CanFrame::new(0x108, [0, v[0], v[1], current, 0, 0, 0, 0])
    }

    fn status(protocol: u8, output_current: u8, flags: u8) -> CanFrame {
        CanFrame::new(0x109, [protocol, 0, 0, output_current, 0, flags, 0, 0])
    }

    #[test]
    fn insufficient_station_voltage_is_fatal() {
        let (mut c, now) = to_handshaking();
        let actions = c.on_frame(Bus::Chademo, &capabilities(300, 30), now);
        assert_eq!(c.state(), State::Error);
        assert!(actions.contains(&Action::StopTransmission));
        assert!(actions.contains(&Action::StopStationLiveness));
        assert!(!c.outputs().charge_enable);
    }

    #[test]
    fn old_protocol_is_fatal() {
        let now = Instant::now();
        let mut config = Config::default();
        config.protocol.version = 2;
        let mut c = ChargeController::new(config, now);
        c.handle(Event::PlugInserted, now);
        c.handle(Event::In1Activated, now);
        c.on_frame(Bus::Chademo, &status(1, 0, 0), now);
        assert_eq!(c.state(), State::Error);
    }

    #[test]
    fn handshake_waits_for_all_parameters() {
        let (mut c, now) = to_handshaking();
        c.on_frame(Bus::Chademo, &capabilities(400, 30), now);
        assert_eq!(c.state(), State::Handshaking);
        assert!(!c.outputs().charge_enable);

        let actions = c.on_frame(Bus::Chademo, &status(1, 0, 0), now);
        assert_eq!(c.state(), State::AwaitConnectorLock);
        assert_eq!(actions, vec![Action::SetOutput(OutputLine::ChargeEnable, true)]);
        assert!(c.session().status.charging_enabled);
    }

    #[test]
    fn in1_drop_during_handshake_returns_to_plug_in() {
        let (mut c, now) = to_handshaking();
        let actions = c.handle(Event::In1Deactivated, now);
        assert_eq!(c.state(), State::PlugIn);
        assert_eq!(
            actions,
            vec![Action::StopTransmission, Action::StopStationLiveness]
        );
    }

    #[test]
    fn winding_down_opens_contactors_at_threshold() {
        let (mut c, now) = to_handshaking();
        c.on_frame(Bus::Chademo, &capabilities(400, 30), now);
        c.on_frame(Bus::Chademo, &status(1, 0, 0b0000_0100), now);
        assert_eq!(c.state(), State::AwaitConnectorLock);
        c.on_frame(Bus::Chademo, &status(1, 0, 0b0000_0100), now);
        assert_eq!(c.state(), State::AwaitInsulationTest);
        c.handle(Event::In2Activated, now);
        assert_eq!(c.state(), State::EnergyTransfer);
        assert!(c.outputs().contactor_permit);

        // Station asks to stop
        c.on_frame(Bus::Chademo, &status(1, 20, 0b0010_0100), now);
        assert_eq!(c.state(), State::WindingDown);
        assert!(!c.outputs().charge_enable);
        assert!(c.outputs().contactor_permit);
        assert!(c.session().status.requesting_stop);

        let later = now + Duration::from_secs(1);
        let actions = c.on_frame(Bus::Chademo, &status(1, 3, 0b0010_0100), later);
        assert_eq!(
            actions,
            vec![Action::SetOutput(OutputLine::ContactorPermit, false)]
        );

        let actions = c.handle(Event::In1Deactivated, later);
        assert_eq!(
            actions,
            vec![Action::StopTransmission, Action::StopStationLiveness]
        );
        assert_eq!(c.state(), State::WindingDown);
    }

    #[test]
    fn inhibit_clears_back_to_plug_in() {
        let now = Instant::now();
        let mut c = ChargeController::new(Config::default(), now);
        c.handle(Event::PlugInserted, now);
        c.handle(Event::ChargeInhibitEnabled, now);
        assert_eq!(c.state(), State::ChargeInhibited);

        // Still held by the line
        c.handle(Event::BmsUpdateReceived, now);
        assert_eq!(c.state(), State::ChargeInhibited);

        c.handle(Event::ChargeInhibitDisabled, now);
        assert_eq!(c.state(), State::PlugIn);
    }

    #[test]
    fn error_only_leaves_on_plug_removal() {
        let (mut c, now) = to_handshaking();
        c.handle(Event::StationLivenessFailed, now);
        assert_eq!(c.state(), State::Error);
        assert!(c.session().status.system_fault);

        for event in [Event::In1Activated, Event::PlugInserted, Event::ChargeInhibitDisabled] {
            assert!(c.handle(event, now).is_empty());
            assert_eq!(c.state(), State::Error);
        }

        c.handle(Event::PlugRemoved, now);
        assert_eq!(c.state(), State::Idle);
        assert!(!c.session().status.system_fault);
    }
}
