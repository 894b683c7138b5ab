//! CHAdeMO and BMS wire frames
//!
//! Frames are fixed 8-byte records keyed by an 11-bit identifier. Multi-byte
//! fields are little-endian.

use crate::error::{ChademoError, Result};
use serde::Serialize;
use std::fmt;

pub mod inbound;
pub mod outbound;

pub use inbound::{decode_bms, decode_frame, decode_station};
pub use outbound::{encode_charge_time, encode_limits, encode_outbound, encode_status};

/// Vehicle limits (target voltage, state of charge)
pub const VEHICLE_LIMITS_ID: u32 = 0x100;
/// Vehicle charging time estimate
pub const VEHICLE_CHARGE_TIME_ID: u32 = 0x101;
/// Vehicle session status
pub const VEHICLE_STATUS_ID: u32 = 0x102;

/// BMS voltage and current limits
pub const BMS_LIMITS_ID: u32 = 0x351;
/// BMS state of charge
pub const BMS_SOC_ID: u32 = 0x355;
/// BMS pack voltage, current and temperature
pub const BMS_STATUS_ID: u32 = 0x356;
/// BMS alarms and warnings
pub const BMS_ALARMS_ID: u32 = 0x35A;

/// Which transceiver a frame travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bus {
    /// Vehicle to station link
    Chademo,
    /// Vehicle-internal bus the BMS talks on
    Main,
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::Chademo => write!(f, "chademo"),
            Bus::Main => write!(f, "main"),
        }
    }
}

/// A classic CAN frame with a full 8-byte payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub data: [u8; 8],
}

impl CanFrame {
    pub fn new(id: u32, data: [u8; 8]) -> Self {
        Self { id, data }
    }

    /// Build a frame from a driver buffer, zero-padding short payloads
    pub fn from_slice(id: u32, payload: &[u8]) -> Result<Self> {
        if id > 0x7FF {
            return Err(ChademoError::codec(id, "identifier exceeds 11 bits"));
        }
        if payload.len() > 8 {
            return Err(ChademoError::codec(
                id,
                format!("payload of {} bytes exceeds 8", payload.len()),
            ));
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self { id, data })
    }

    pub(crate) fn u16_le(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    pub(crate) fn i16_le(&self, at: usize) -> i16 {
        i16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    pub(crate) fn bit(&self, byte: usize, bit: u8) -> bool {
        self.data[byte] & (1 << bit) != 0
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [", self.id)?;
        for (i, b) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        write!(f, "]")
    }
}
