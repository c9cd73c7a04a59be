use crate::power::{Mode, PowerData};
use crate::utils::Utils;

use chrono::{DateTime, Local};

/// The PV data response carries exactly this many payload bytes.
pub const PV_PAYLOAD_LEN: usize = 50;

/// Decodes the fixed-layout PV data payload into a sample.
///
/// Each known field is a big-endian word at a fixed word offset; its source
/// bytes are zeroed in a working copy as it is extracted. Any byte left
/// non-zero afterwards means the firmware put something there we do not
/// understand yet, and the whole sample is rejected rather than recorded
/// half-decoded.
pub fn decode_pv_payload(payload: &[u8], timestamp: DateTime<Local>) -> Option<PowerData> {
    if payload.len() != PV_PAYLOAD_LEN {
        return None;
    }
    let mut scratch = payload.to_vec();

    let panel_voltage = extract_word(&mut scratch, 1);
    let panel_current = extract_word(&mut scratch, 2);
    let mode = extract_word(&mut scratch, 5);
    let energy_today = extract_word(&mut scratch, 6);
    let fault = extract_word(&mut scratch, 7);
    let grid_current = extract_word(&mut scratch, 19);
    let grid_voltage = extract_word(&mut scratch, 20);
    let grid_frequency = extract_word(&mut scratch, 21);
    let grid_power = extract_word(&mut scratch, 22);
    let total_energy =
        ((extract_word(&mut scratch, 23) as u32) << 16) + extract_word(&mut scratch, 24) as u32;

    if scratch.iter().any(|b| *b != 0) {
        return None;
    }

    // An unknown mode word gets the same treatment as unknown payload bytes.
    let mode = Mode::try_from(mode).ok()?;

    Some(PowerData {
        timestamp,
        power_w: grid_power as f64,
        panel_voltage_v: panel_voltage as f64 / 10.0,
        grid_voltage_v: grid_voltage as f64 / 10.0,
        panel_current_a: panel_current as f64 / 10.0,
        grid_current_a: grid_current as f64 / 10.0,
        mode,
        fault,
        energy_today_wh: energy_today as f64 * 10.0,
        grid_frequency_hz: grid_frequency as f64 / 100.0,
        total_energy_kwh: total_energy as f64 / 10.0,
        home_usage_current_a: None,
    })
}

/// Reads the big-endian word at a word offset and zeroes its source bytes.
fn extract_word(payload: &mut [u8], word_pos: usize) -> u16 {
    let pos = word_pos * 2;
    let value = Utils::word_at(payload, pos);
    payload[pos] = 0;
    payload[pos + 1] = 0;
    value
}
