//! Charging session state machine
//!
//! [`ChargeController`] owns every piece of mutable charging state: the
//! session, both snapshots, the ramp controller and the liveness supervisors.
//! Raw stimuli (frames, line edges, liveness ticks) are normalised into
//! [`Event`]s and fed one at a time through [`ChargeController::handle`],
//! which returns the ordered side effects for the runtime to apply.
//!
//! The controller does no I/O and reads no clock; callers pass `now`.

use crate::battery::BatterySnapshot;
use crate::codec::{self, Bus, CanFrame};
use crate::config::Config;
use crate::hal::InputLine;
use crate::liveness::{LivenessSupervisor, Peer};
use crate::logging::{StructuredLogger, get_logger};
use crate::ramp::RampController;
use crate::session::ChargingSession;
use crate::station::StationSnapshot;
use std::time::{Duration, Instant};

mod actions;
mod transitions;
mod types;

pub use types::{
    Action, ControllerSnapshot, Event, IndicatorMode, InputLevels, OutputLevels, State,
};

pub struct ChargeController {
    config: Config,
    session: ChargingSession,
    battery: BatterySnapshot,
    station: StationSnapshot,
    ramp: RampController,
    bms_liveness: LivenessSupervisor,
    station_liveness: LivenessSupervisor,
    inputs: InputLevels,
    outputs: OutputLevels,
    transmitting: bool,
    /// Side effects of the event being handled
    pending: Vec<Action>,
    logger: StructuredLogger,
}

impl ChargeController {
    /// Create a controller in Idle with BMS supervision armed from `now`
    pub fn new(config: Config, now: Instant) -> Self {
        let battery = BatterySnapshot::new(&config.battery);
        let session = ChargingSession::new(&config, &battery);
        let logger = get_logger("controller").for_session(&session.id().to_string());

        let mut bms_liveness = LivenessSupervisor::new(
            Peer::Bms,
            Duration::from_millis(config.liveness.bms_ttl_ms),
        );
        bms_liveness.arm(now);
        let station_liveness = LivenessSupervisor::new(
            Peer::Station,
            Duration::from_millis(config.liveness.station_ttl_ms),
        );

        Self {
            ramp: RampController::new(&config.ramp),
            station: StationSnapshot::new(),
            inputs: InputLevels::default(),
            outputs: OutputLevels::default(),
            transmitting: false,
            pending: Vec::new(),
            config,
            session,
            battery,
            bms_liveness,
            station_liveness,
            logger,
        }
    }

    /// Handle one event to completion and return its side effects in order
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Action> {
        self.mirror_inputs(event);
        self.logger
            .trace(&format!("Handling {:?} in state {}", event, self.session.state));
        self.dispatch(event, now);
        std::mem::take(&mut self.pending)
    }

    /// Decode an inbound frame and handle the event it implies
    pub fn on_frame(&mut self, bus: Bus, frame: &CanFrame, now: Instant) -> Vec<Action> {
        let event = codec::decode_frame(
            bus,
            frame,
            &self.config.protocol,
            &mut self.battery,
            &mut self.station,
            now,
        );
        match event {
            Some(event) => self.handle(event, now),
            None => {
                self.logger
                    .trace(&format!("Ignoring frame {} on {} bus", frame, bus));
                Vec::new()
            }
        }
    }

    /// Translate an input edge into its event
    pub fn on_line(&mut self, line: InputLine, active: bool, now: Instant) -> Vec<Action> {
        let event = match (line, active) {
            (InputLine::PlugDetect, true) => Event::PlugInserted,
            (InputLine::PlugDetect, false) => Event::PlugRemoved,
            (InputLine::In1, true) => Event::In1Activated,
            (InputLine::In1, false) => Event::In1Deactivated,
            (InputLine::In2, true) => Event::In2Activated,
            (InputLine::In2, false) => Event::In2Deactivated,
            (InputLine::ChargeInhibit, true) => Event::ChargeInhibitEnabled,
            (InputLine::ChargeInhibit, false) => Event::ChargeInhibitDisabled,
        };
        self.handle(event, now)
    }

    /// Run one liveness check; raises the failure event if the peer is silent
    pub fn check_liveness(&mut self, peer: Peer, now: Instant) -> Vec<Action> {
        let (supervisor, last_seen) = match peer {
            Peer::Bms => (&self.bms_liveness, self.battery.last_seen),
            Peer::Station => (&self.station_liveness, self.station.last_seen),
        };
        if supervisor.check(last_seen, now) {
            return Vec::new();
        }
        if self.session.state.liveness_fatal() {
            self.logger.warn(&format!(
                "No message from {} within {} ms",
                peer,
                supervisor.ttl().as_millis()
            ));
        }
        self.handle(Event::liveness_failure(peer), now)
    }

    /// The periodic 0x100/0x101/0x102 burst for the present state
    pub fn outbound_frames(&self) -> [CanFrame; 3] {
        codec::encode_outbound(
            self.config.protocol.version,
            &self.session,
            &self.battery,
            !self.outputs.contactor_permit,
        )
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.session.state;
        let phase = (state == State::EnergyTransfer).then(|| {
            self.ramp
                .phase(self.station.output_voltage, self.session.target_voltage)
        });
        ControllerSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: self.session.id().to_string(),
            state,
            indicator: state.indicator(),
            requested_current: self.session.requested_current,
            target_voltage: self.session.target_voltage,
            target_soc: self.session.target_soc,
            charging_time_minutes: self.session.charging_time_minutes,
            charging_time_minutes_max: self.session.charging_time_minutes_max,
            phase,
            inputs: self.inputs,
            outputs: self.outputs,
            transmitting: self.transmitting,
            charging_enabled: self.session.status.charging_enabled,
            requesting_stop: self.session.status.requesting_stop,
            battery_soc: self.battery.soc(),
            battery_voltage: self.battery.voltage,
            battery_current: self.battery.current,
            battery_temperature: self.battery.temperature,
            station_output_voltage: self.station.output_voltage,
            station_output_current: self.station.output_current,
            station_available_current: self.station.available_current,
        }
    }

    pub fn state(&self) -> State {
        self.session.state
    }

    pub fn session(&self) -> &ChargingSession {
        &self.session
    }

    pub fn battery(&self) -> &BatterySnapshot {
        &self.battery
    }

    pub fn station(&self) -> &StationSnapshot {
        &self.station
    }

    pub fn inputs(&self) -> InputLevels {
        self.inputs
    }

    pub fn outputs(&self) -> OutputLevels {
        self.outputs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the outbound burst should be running
    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub fn station_supervised(&self) -> bool {
        self.station_liveness.is_armed()
    }

    fn mirror_inputs(&mut self, event: Event) {
        match event {
            Event::PlugInserted => self.inputs.plug_present = true,
            Event::PlugRemoved => self.inputs.plug_present = false,
            Event::In1Activated => self.inputs.in1 = true,
            Event::In1Deactivated => self.inputs.in1 = false,
            Event::In2Activated => self.inputs.in2 = true,
            Event::In2Deactivated => self.inputs.in2 = false,
            Event::ChargeInhibitEnabled => self.inputs.charge_inhibit = true,
            Event::ChargeInhibitDisabled => self.inputs.charge_inhibit = false,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::OutputLine;

    fn controller() -> (ChargeController, Instant) {
        let now = Instant::now();
        (ChargeController::new(Config::default(), now), now)
    }

    #[test]
    fn starts_idle_and_quiet() {
        let (c, _) = controller();
        assert_eq!(c.state(), State::Idle);
        assert_eq!(c.outputs(), OutputLevels::default());
        assert!(!c.is_transmitting());
        assert!(!c.station_supervised());
        assert_eq!(c.snapshot().indicator, IndicatorMode::Standby);
    }

    #[test]
    fn line_edges_map_to_events() {
        let (mut c, now) = controller();
        c.on_line(InputLine::PlugDetect, true, now);
        assert_eq!(c.state(), State::PlugIn);
        assert!(c.inputs().plug_present);

        let actions = c.on_line(InputLine::In1, true, now);
        assert_eq!(c.state(), State::Handshaking);
        assert_eq!(
            actions,
            vec![Action::StartTransmission, Action::StartStationLiveness]
        );
        assert!(!c.outputs().get(OutputLine::ChargeEnable));
    }

    #[test]
    fn unknown_frames_do_nothing() {
        let (mut c, now) = controller();
        let actions = c.on_frame(Bus::Main, &CanFrame::new(0x7FF, [0; 8]), now);
        assert!(actions.is_empty());
        assert_eq!(c.battery().last_seen, None);
    }

    #[test]
    fn bms_silence_is_detected_after_ttl() {
        let (mut c, now) = controller();
        assert!(c.check_liveness(Peer::Bms, now + Duration::from_millis(4999)).is_empty());
        c.check_liveness(Peer::Bms, now + Duration::from_millis(5000));
        assert_eq!(c.state(), State::Error);
        assert_eq!(c.snapshot().indicator, IndicatorMode::Fault);
    }

    #[test]
    fn outbound_reports_open_contactors_when_idle() {
        let (c, _) = controller();
        let [limits, time, status] = c.outbound_frames();
        assert_eq!(limits.id, 0x100);
        assert_eq!(time.id, 0x101);
        assert_eq!(status.id, 0x102);
        assert_eq!(status.data[0], 1);
        assert_eq!(status.data[5], 0b0000_1000);
    }
}
