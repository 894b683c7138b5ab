//! Inbound frame decoders
//!
//! Each decoder writes the snapshot, stamps its heartbeat and returns the
//! event the controller should see. Frames with unknown ids decode to `None`
//! and leave the snapshot untouched.

use super::{BMS_ALARMS_ID, BMS_LIMITS_ID, BMS_SOC_ID, BMS_STATUS_ID, Bus, CanFrame};
use crate::battery::{BatteryAlarms, BatterySnapshot};
use crate::config::ProtocolConfig;
use crate::controller::Event;
use crate::station::{StationFlags, StationSnapshot};
use std::time::Instant;

/// Decode a BMS frame from the main bus
pub fn decode_bms(frame: &CanFrame, battery: &mut BatterySnapshot, now: Instant) -> Option<Event> {
    match frame.id {
        BMS_LIMITS_ID => {
            battery.maximum_voltage = f32::from(frame.u16_le(0)) / 10.0;
            battery.maximum_charge_current = f32::from(frame.u16_le(2)) / 10.0;
            battery.maximum_discharge_current = f32::from(frame.u16_le(4)) / 10.0;
            battery.minimum_voltage = f32::from(frame.u16_le(6)) / 10.0;
        }
        BMS_SOC_ID => {
            battery.state_of_charge = frame.u16_le(0);
        }
        BMS_STATUS_ID => {
            battery.voltage = f32::from(frame.u16_le(0)) / 100.0;
            battery.current = f32::from(frame.i16_le(2)) / 10.0;
            battery.temperature = f32::from(frame.i16_le(4)) / 10.0;
            battery.measured_voltage = f32::from(frame.u16_le(6)) / 100.0;
        }
        BMS_ALARMS_ID => {
            battery.alarms = BatteryAlarms {
                high_cell_alarm: frame.bit(0, 2),
                low_cell_alarm: frame.bit(0, 4),
                high_temp_alarm: frame.bit(0, 6),
                low_temp_alarm: frame.data[1] != 0,
                cell_delta_alarm: frame.data[3] != 0,
                high_cell_warn: frame.bit(4, 2),
                low_cell_warn: frame.bit(4, 4),
                high_temp_warn: frame.bit(4, 6),
                low_temp_warn: frame.data[5] != 0,
            };
        }
        _ => return None,
    }
    battery.heartbeat(now);
    Some(Event::BmsUpdateReceived)
}

/// Decode a station frame from the CHAdeMO bus
pub fn decode_station(
    frame: &CanFrame,
    ids: &ProtocolConfig,
    station: &mut StationSnapshot,
    now: Instant,
) -> Option<Event> {
    let event = if frame.id == ids.station_capabilities_id {
        station.weld_detection = frame.data[0] != 0;
        station.max_available_voltage = frame.u16_le(1);
        station.available_current = frame.data[3];
        station.threshold_voltage = frame.u16_le(4);
        Event::StationCapabilitiesUpdated
    } else if frame.id == ids.station_status_id {
        station.protocol_number = frame.data[0];
        station.output_voltage = frame.u16_le(1);
        station.output_current = frame.data[3];
        station.flags = StationFlags {
            charging: frame.bit(5, 0),
            malfunction: frame.bit(5, 1),
            connector_locked: frame.bit(5, 2),
            battery_incompatible: frame.bit(5, 3),
            system_malfunction: frame.bit(5, 4),
            stop_control: frame.bit(5, 5),
        };
        station.remaining_seconds = u16::from(frame.data[6]) * 10;
        station.remaining_minutes = frame.data[7];
        Event::StationStatusUpdated
    } else {
        return None;
    };
    station.heartbeat(now);
    Some(event)
}

/// Route a frame to the decoder for the bus it arrived on
pub fn decode_frame(
    bus: Bus,
    frame: &CanFrame,
    ids: &ProtocolConfig,
    battery: &mut BatterySnapshot,
    station: &mut StationSnapshot,
    now: Instant,
) -> Option<Event> {
    match bus {
        Bus::Chademo => decode_station(frame, ids, station, now),
        Bus::Main => decode_bms(frame, battery, now),
    }
}
