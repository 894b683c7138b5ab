//! Hardware boundary
//!
//! The controller never touches a transceiver or a GPIO directly. The runtime
//! talks to these traits, which the board support code implements; the
//! in-memory versions in [`memory`] stand in on the bench and in tests.

use crate::codec::CanFrame;
use crate::error::Result;
use serde::Serialize;
use std::fmt;

pub mod memory;

pub use memory::{MemoryBus, MemoryLines};

/// Digital inputs reported as edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputLine {
    /// Connector present
    PlugDetect,
    /// Station charge start/stop 1 (IN1)
    In1,
    /// Station charge start/stop 2 (IN2)
    In2,
    /// External charge inhibit from the BMS
    ChargeInhibit,
}

/// Digital outputs driven by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutputLine {
    /// Vehicle charge permission to the station
    ChargeEnable,
    /// Permission to close the main contactors
    ContactorPermit,
}

impl fmt::Display for InputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputLine::PlugDetect => "plug-detect",
            InputLine::In1 => "IN1",
            InputLine::In2 => "IN2",
            InputLine::ChargeInhibit => "charge-inhibit",
        };
        f.write_str(name)
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputLine::ChargeEnable => "charge-enable",
            OutputLine::ContactorPermit => "contactor-permit",
        };
        f.write_str(name)
    }
}

/// A CAN transceiver
#[async_trait::async_trait]
pub trait CanBus: Send + Sync {
    async fn send(&self, frame: CanFrame) -> Result<()>;

    /// Wait for the next inbound frame
    async fn recv(&self) -> Result<CanFrame>;
}

/// Named digital lines
#[async_trait::async_trait]
pub trait SignalLines: Send + Sync {
    /// Present level of an input (true = active)
    fn read(&self, line: InputLine) -> Result<bool>;

    fn write(&self, line: OutputLine, active: bool) -> Result<()>;

    /// Wait for the next input edge
    async fn next_edge(&self) -> Result<(InputLine, bool)>;
}
