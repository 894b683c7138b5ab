use chademo_ctl::battery::BatterySnapshot;
use chademo_ctl::codec::{self, Bus, CanFrame};
use chademo_ctl::config::Config;
use chademo_ctl::controller::Event;
use chademo_ctl::session::ChargingSession;
use chademo_ctl::station::StationSnapshot;
use std::time::Instant;

#[test]
fn station_capabilities_decode() {
    let config = Config::default();
    let mut station = StationSnapshot::new();
    let now = Instant::now();
    // weld detection, 500 V, 125 A, threshold 410 V
    let frame = CanFrame::new(0x108, [1, 0xF4, 0x01, 125, 0x9A, 0x01, 0, 0]);

    let event = codec::decode_station(&frame, &config.protocol, &mut station, now);
    assert_eq!(event, Some(Event::StationCapabilitiesUpdated));
    assert!(station.weld_detection);
    assert_eq!(station.max_available_voltage, 500);
    assert_eq!(station.available_current, 125);
    assert_eq!(station.threshold_voltage, 410);
    assert_eq!(station.last_seen, Some(now));
}

#[test]
fn station_status_decode() {
    let config = Config::default();
    let mut station = StationSnapshot::new();
    let now = Instant::now();
    let frame = CanFrame::new(0x109, [2, 0x68, 0x01, 42, 0, 0b0010_0101, 12, 30]);

    let event = codec::decode_station(&frame, &config.protocol, &mut station, now);
    assert_eq!(event, Some(Event::StationStatusUpdated));
    assert_eq!(station.protocol_number, 2);
    assert_eq!(station.output_voltage, 360);
    assert_eq!(station.output_current, 42);
    assert!(station.flags.charging);
    assert!(!station.flags.malfunction);
    assert!(station.flags.connector_locked);
    assert!(!station.flags.battery_incompatible);
    assert!(!station.flags.system_malfunction);
    assert!(station.flags.stop_control);
    assert_eq!(station.remaining_seconds, 120);
    assert_eq!(station.remaining_minutes, 30);
}

#[test]
fn station_ids_follow_configuration() {
    let mut config = Config::default();
    config.protocol.station_status_id = 0x209;
    let mut station = StationSnapshot::new();
    let now = Instant::now();
    let frame = CanFrame::new(0x109, [1, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(codec::decode_station(&frame, &config.protocol, &mut station, now), None);
    let frame = CanFrame::new(0x209, [1, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        codec::decode_station(&frame, &config.protocol, &mut station, now),
        Some(Event::StationStatusUpdated)
    );
}

#[test]
fn bms_status_and_soc_decode() {
    let config = Config::default();
    let mut battery = BatterySnapshot::new(&config.battery);
    let now = Instant::now();

    // 330.50 V, -12.5 A, 31.2 C, 330.40 V measured
    let v = 33050u16.to_le_bytes();
    let i = (-125i16).to_le_bytes();
    let t = 312i16.to_le_bytes();
    let m = 33040u16.to_le_bytes();
    let frame = CanFrame::new(0x356, [v[0], v[1], i[0], i[1], t[0], t[1], m[0], m[1]]);
    assert_eq!(codec::decode_bms(&frame, &mut battery, now), Some(Event::BmsUpdateReceived));
    assert!((battery.voltage - 330.5).abs() < 1e-3);
    assert!((battery.current + 12.5).abs() < 1e-3);
    assert!((battery.temperature - 31.2).abs() < 1e-3);
    assert!((battery.measured_voltage - 330.4).abs() < 1e-3);

    let frame = CanFrame::new(0x355, [0x2C, 0x01, 0, 0, 0, 0, 0, 0]);
    codec::decode_bms(&frame, &mut battery, now);
    assert_eq!(battery.state_of_charge, 300);
    assert_eq!(battery.soc(), 100);
}

#[test]
fn bms_alarm_bits() {
    let config = Config::default();
    let mut battery = BatterySnapshot::new(&config.battery);
    let now = Instant::now();
    let frame = CanFrame::new(0x35A, [0b0101_0100, 1, 0, 1, 0b0101_0100, 1, 0, 0]);
    codec::decode_bms(&frame, &mut battery, now);
    let a = battery.alarms;
    assert!(a.high_cell_alarm && a.low_cell_alarm && a.high_temp_alarm);
    assert!(a.low_temp_alarm && a.cell_delta_alarm);
    assert!(a.high_cell_warn && a.low_cell_warn && a.high_temp_warn && a.low_temp_warn);

    let frame = CanFrame::new(0x35A, [0b1010_1011, 0, 0xFF, 0, 0b1010_1011, 0, 0, 0]);
    codec::decode_bms(&frame, &mut battery, now);
    assert_eq!(battery.alarms, Default::default());
}

#[test]
fn status_frame_layout() {
    let config = Config::default();
    let mut battery = BatterySnapshot::new(&config.battery);
    battery.alarms.low_cell_alarm = true;
    let mut session = ChargingSession::new(&config, &battery);
    session.requested_current = 27;
    session.status.charging_enabled = true;
    session.status.not_in_park = true;

    let frame = codec::encode_status(1, &session, &battery, false);
    assert_eq!(frame.id, 0x102);
    assert_eq!(frame.data, [1, 0x4A, 0x01, 27, 0b0000_0010, 0b0000_0011, 0, 0]);

    let frame = codec::encode_status(1, &session, &battery, true);
    assert_eq!(frame.data[5], 0b0000_1011);
}

#[test]
fn outbound_burst_order() {
    let config = Config::default();
    let battery = BatterySnapshot::new(&config.battery);
    let session = ChargingSession::new(&config, &battery);
    let ids: Vec<u32> = codec::encode_outbound(1, &session, &battery, true)
        .iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec![0x100, 0x101, 0x102]);
}

#[test]
fn decode_frame_routes_by_bus() {
    let config = Config::default();
    let mut battery = BatterySnapshot::new(&config.battery);
    let mut station = StationSnapshot::new();
    let now = Instant::now();
    let frame = CanFrame::new(0x108, [0, 0x90, 0x01, 50, 0, 0, 0, 0]);
    assert_eq!(
        codec::decode_frame(Bus::Main, &frame, &config.protocol, &mut battery, &mut station, now),
        None
    );
    assert_eq!(
        codec::decode_frame(Bus::Chademo, &frame, &config.protocol, &mut battery, &mut station, now),
        Some(Event::StationCapabilitiesUpdated)
    );
    assert_eq!(station.max_available_voltage, 400);
}
