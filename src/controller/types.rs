use crate::hal::OutputLine;
use crate::liveness::Peer;
use crate::ramp::Phase;
use serde::Serialize;
use std::fmt;

/// Charging session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum State {
    Idle,
    PlugIn,
    Handshaking,
    AwaitConnectorLock,
    AwaitInsulationTest,
    EnergyTransfer,
    WindingDown,
    ChargeInhibited,
    Error,
}

impl State {
    /// States in which charge-enable and the charging-enabled flag may be asserted
    pub fn permits_charge_enable(self) -> bool {
        matches!(
            self,
            State::AwaitConnectorLock | State::AwaitInsulationTest | State::EnergyTransfer
        )
    }

    /// States in which contactor closure may be permitted
    pub fn permits_contactor(self) -> bool {
        matches!(self, State::EnergyTransfer | State::WindingDown)
    }

    /// Whether a liveness failure ends the session
    pub fn liveness_fatal(self) -> bool {
        !matches!(
            self,
            State::WindingDown | State::ChargeInhibited | State::Error
        )
    }

    /// Status indicator pattern for this state
    pub fn indicator(self) -> IndicatorMode {
        match self {
            State::Error => IndicatorMode::Fault,
            State::Handshaking
            | State::AwaitConnectorLock
            | State::AwaitInsulationTest
            | State::EnergyTransfer
            | State::WindingDown => IndicatorMode::Charging,
            State::Idle | State::PlugIn | State::ChargeInhibited => IndicatorMode::Standby,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::PlugIn => "plug_in",
            State::Handshaking => "handshaking",
            State::AwaitConnectorLock => "await_connector_lock",
            State::AwaitInsulationTest => "await_insulation_test",
            State::EnergyTransfer => "energy_transfer",
            State::WindingDown => "winding_down",
            State::ChargeInhibited => "charge_inhibited",
            State::Error => "error",
        };
        f.write_str(name)
    }
}

/// Everything the state machine reacts to
///
/// Events carry no data; whatever they imply is already in the snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Event {
    PlugInserted,
    PlugRemoved,
    In1Activated,
    In1Deactivated,
    In2Activated,
    In2Deactivated,
    StationCapabilitiesUpdated,
    StationStatusUpdated,
    BmsUpdateReceived,
    ChargeInhibitEnabled,
    ChargeInhibitDisabled,
    BmsLivenessFailed,
    StationLivenessFailed,
}

impl Event {
    pub fn liveness_failure(peer: Peer) -> Self {
        match peer {
            Peer::Bms => Event::BmsLivenessFailed,
            Peer::Station => Event::StationLivenessFailed,
        }
    }
}

/// Side effect requested by the state machine, applied in order by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    SetOutput(OutputLine, bool),
    StartTransmission,
    StopTransmission,
    StartStationLiveness,
    StopStationLiveness,
}

/// Status indicator pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorMode {
    Standby,
    Charging,
    Fault,
}

/// Levels of the input lines as last reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputLevels {
    pub plug_present: bool,
    pub in1: bool,
    pub in2: bool,
    pub charge_inhibit: bool,
}

/// Levels the controller has driven its outputs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputLevels {
    pub charge_enable: bool,
    pub contactor_permit: bool,
}

impl OutputLevels {
    pub fn get(&self, line: OutputLine) -> bool {
        match line {
            OutputLine::ChargeEnable => self.charge_enable,
            OutputLine::ContactorPermit => self.contactor_permit,
        }
    }

    pub(crate) fn set(&mut self, line: OutputLine, active: bool) {
        match line {
            OutputLine::ChargeEnable => self.charge_enable = active,
            OutputLine::ContactorPermit => self.contactor_permit = active,
        }
    }
}

/// Point-in-time view of the controller for observers
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub timestamp: String,
    pub session_id: String,
    pub state: State,
    pub indicator: IndicatorMode,
    pub requested_current: u8,
    pub target_voltage: u16,
    pub target_soc: u8,
    pub charging_time_minutes: u8,
    pub charging_time_minutes_max: u8,
    pub phase: Option<Phase>,
    pub inputs: InputLevels,
    pub outputs: OutputLevels,
    pub transmitting: bool,
    pub charging_enabled: bool,
    pub requesting_stop: bool,
    pub battery_soc: u8,
    pub battery_voltage: f32,
    pub battery_current: f32,
    pub battery_temperature: f32,
    pub station_output_voltage: u16,
    pub station_output_current: u8,
    pub station_available_current: u8,
}
