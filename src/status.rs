use crate::power::Mode;

use serde::Serialize;

/// Snapshot answered to status/monitoring queries. Field names mirror the
/// web GUI payload this bridge has always served.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SolarStatus {
    pub online: bool,

    #[serde(rename = "currentW")]
    pub current_w: f64,

    #[serde(rename = "currentTs")]
    pub current_ts: String,

    #[serde(rename = "totalDayWh")]
    pub total_day_wh: f64,

    #[serde(rename = "totalKwh")]
    pub total_kwh: f64,

    pub mode: Option<Mode>,

    pub fault: u16,

    #[serde(rename = "peakW")]
    pub peak_w: f64,

    #[serde(rename = "peakTsTime")]
    pub peak_ts_time: String,

    /// Last sampled grid voltage; kept across the night so the home
    /// ammeter's net-metering math still has a voltage to work with.
    #[serde(rename = "gridV")]
    pub grid_v: f64,

    #[serde(rename = "usageA")]
    pub usage_a: Option<f64>,
}
