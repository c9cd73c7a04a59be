use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

/// Operating mode word reported by the inverter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Mode {
    Off = 0,
    On = 1,
    Fault = 2,
}

/// One successful poll of the inverter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PowerData {
    pub timestamp: DateTime<Local>,
    /// Instantaneous power fed into the grid.
    pub power_w: f64,
    /// Lifetime production counter.
    pub total_energy_kwh: f64,
    pub mode: Mode,
    /// Cumulative production counter for the current day. Resets when the
    /// inverter power-cycles, see [`DayPowerData::aggregate`].
    pub energy_today_wh: f64,
    pub grid_current_a: f64,
    pub panel_current_a: f64,
    pub grid_voltage_v: f64,
    pub panel_voltage_v: f64,
    pub grid_frequency_hz: f64,
    /// Fault bitmask, 0 when healthy.
    pub fault: u16,
    /// Home mains draw from the secondary ammeter, for net metering.
    pub home_usage_current_a: Option<f64>,
}

/// Aggregate over all samples of one calendar day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DayPowerData {
    pub date: NaiveDate,
    /// Time of day of the first sample with power > 0.
    pub first: NaiveTime,
    /// Time of day of the last sample with power > 0.
    pub last: NaiveTime,
    pub power_kwh: f64,
    /// Whether any sample of the day carried a non-zero fault.
    pub fault: bool,
    pub peak_power_w: f64,
    pub peak_timestamp: NaiveTime,
}

impl DayPowerData {
    /// Folds one day of samples into a summary. Returns `None` when no
    /// sample produced power, or when the first and last producing samples
    /// coincide (a single instant is not a sun window).
    ///
    /// The energy-today counter normally grows monotonically, so the last
    /// sample would be enough. An inverter reset mid-day starts the counter
    /// over though, leaving several ramps to sum: whenever the counter is
    /// seen decreasing, the previous ramp's final value is flushed into the
    /// total before continuing.
    pub fn aggregate(date: NaiveDate, samples: &[PowerData]) -> Option<Self> {
        let first = samples.iter().find(|s| s.power_w > 0.0)?.timestamp;
        let last = samples.iter().rev().find(|s| s.power_w > 0.0)?.timestamp;
        if first == last {
            return None;
        }

        let fault = samples.iter().any(|s| s.fault != 0);

        let mut last_seen = 0.0;
        let mut total_wh = 0.0;
        for sample in samples {
            if sample.energy_today_wh < last_seen {
                total_wh += last_seen;
            }
            last_seen = sample.energy_today_wh;
        }
        total_wh += last_seen;

        // First maximum wins on ties, deliberately.
        let peak = samples
            .iter()
            .fold(None::<&PowerData>, |best, sample| match best {
                Some(best) if sample.power_w > best.power_w => Some(sample),
                None => Some(sample),
                best => best,
            })?;

        Some(Self {
            date,
            first: first.time(),
            last: last.time(),
            power_kwh: total_wh / 1000.0,
            fault,
            peak_power_w: peak.power_w,
            peak_timestamp: peak.timestamp.time(),
        })
    }

    /// Span between the first and last producing sample of the day.
    pub fn sun_time(&self) -> chrono::Duration {
        self.last - self.first
    }
}

/// Human-readable text for the known fault bits; unknown masks fall back to
/// their hex value.
pub fn fault_description(fault: u16) -> String {
    match fault {
        0x800 => "No grid connection".to_string(),
        0x1000 => "Grid frequency too low".to_string(),
        0x2000 => "Grid frequency too high".to_string(),
        _ => format!("0x{:04X}", fault),
    }
}
