//! Outbound vehicle frames (0x100, 0x101, 0x102)

use super::{CanFrame, VEHICLE_CHARGE_TIME_ID, VEHICLE_LIMITS_ID, VEHICLE_STATUS_ID};
use crate::battery::BatterySnapshot;
use crate::session::ChargingSession;

/// 0x100: target voltage and state of charge
pub fn encode_limits(session: &ChargingSession, battery: &BatterySnapshot) -> CanFrame {
    let mut data = [0u8; 8];
    data[4..6].copy_from_slice(&session.target_voltage.to_le_bytes());
    data[6] = battery.soc();
    CanFrame::new(VEHICLE_LIMITS_ID, data)
}

/// 0x101: charging time estimate and rated capacity
pub fn encode_charge_time(session: &ChargingSession, battery: &BatterySnapshot) -> CanFrame {
    let mut data = [0u8; 8];
    // Seconds field unused, station reads the minutes
    data[1] = 0xFF;
    data[2] = session.charging_time_minutes_max;
    data[3] = session.charging_time_minutes;
    data[5..7].copy_from_slice(&battery.scaled_capacity().to_le_bytes());
    CanFrame::new(VEHICLE_CHARGE_TIME_ID, data)
}

/// 0x102: protocol, target, request and status bytes
pub fn encode_status(
    protocol_version: u8,
    session: &ChargingSession,
    battery: &BatterySnapshot,
    contactors_open: bool,
) -> CanFrame {
    let mut data = [0u8; 8];
    data[0] = protocol_version;
    data[1..3].copy_from_slice(&session.target_voltage.to_le_bytes());
    data[3] = session.requested_current;
    data[4] = session.battery_status_byte(battery);
    data[5] = session.vehicle_status_byte(contactors_open);
    CanFrame::new(VEHICLE_STATUS_ID, data)
}

/// The periodic burst, in transmission order
pub fn encode_outbound(
    protocol_version: u8,
    session: &ChargingSession,
    battery: &BatterySnapshot,
    contactors_open: bool,
) -> [CanFrame; 3] {
    [
        encode_limits(session, battery),
        encode_charge_time(session, battery),
        encode_status(protocol_version, session, battery, contactors_open),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn limits_layout() {
        let config = Config::default();
        let mut battery = BatterySnapshot::new(&config.battery);
        battery.state_of_charge = 130;
        let session = ChargingSession::new(&config, &battery);
        let frame = encode_limits(&session, &battery);
        assert_eq!(frame.id, 0x100);
        // Target at 80 %: 330 V = 0x014A
        assert_eq!(frame.data, [0, 0, 0, 0, 0x4A, 0x01, 100, 0]);
    }

    #[test]
    fn charge_time_layout() {
        let config = Config::default();
        let battery = BatterySnapshot::new(&config.battery);
        let mut session = ChargingSession::new(&config, &battery);
        session.charging_time_minutes = 50;
        session.charging_time_minutes_max = 60;
        let frame = encode_charge_time(&session, &battery);
        assert_eq!(frame.id, 0x101);
        assert_eq!(frame.data, [0, 0xFF, 60, 50, 0, 200, 0, 0]);
    }
}
