#![no_main]
use chademo_ctl::battery::BatterySnapshot;
use chademo_ctl::codec::{CanFrame, decode_bms, decode_station};
use chademo_ctl::config::Config;
use chademo_ctl::station::StationSnapshot;
use libfuzzer_sys::fuzz_target;
use std::time::Instant;

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the id, the rest is the payload
    if data.len() < 2 {
        return;
    }
    let id = u32::from(u16::from_le_bytes([data[0], data[1]]));
    let Ok(frame) = CanFrame::from_slice(id, &data[2..]) else {
        return;
    };

    let config = Config::default();
    let mut battery = BatterySnapshot::new(&config.battery);
    let mut station = StationSnapshot::new();
    let now = Instant::now();
    let _ = decode_bms(&frame, &mut battery, now);
    let _ = decode_station(&frame, &config.protocol, &mut station, now);

    // Derived values must stay in range whatever the BMS reports
    assert!(battery.soc() <= 100);
    let _ = battery.charge_current_limit();
    let _ = battery.voltage_from_soc(battery.soc());
});
