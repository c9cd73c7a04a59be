use crate::power::{DayPowerData, PowerData};

use chrono::{Local, NaiveDate};

/// Time-series store for power samples. The bridge appends every decoded
/// sample and reads the day aggregate back when the day ends.
pub trait TimeSeries: Send {
    fn add_sample(&mut self, sample: PowerData);
    fn last_sample(&self) -> Option<PowerData>;
    fn aggregated_data(&self) -> Option<DayPowerData>;
}

/// Keeps the current day's samples in memory; the aggregate is computed on
/// demand rather than maintained incrementally. Samples from a new day flush
/// the previous window.
pub struct MemoryTimeSeries {
    date: NaiveDate,
    samples: Vec<PowerData>,
}

impl Default for MemoryTimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTimeSeries {
    pub fn new() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            samples: Vec::new(),
        }
    }

    fn roll_over(&mut self, date: NaiveDate) {
        if date != self.date {
            self.samples.clear();
            self.date = date;
        }
    }
}

impl TimeSeries for MemoryTimeSeries {
    fn add_sample(&mut self, sample: PowerData) {
        self.roll_over(sample.timestamp.date_naive());
        self.samples.push(sample);
    }

    fn last_sample(&self) -> Option<PowerData> {
        self.samples.last().cloned()
    }

    fn aggregated_data(&self) -> Option<DayPowerData> {
        DayPowerData::aggregate(self.date, &self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::Mode;
    use chrono::TimeZone;

    fn sample(day: u32, hour: u32, power_w: f64) -> PowerData {
        PowerData {
            timestamp: Local.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            power_w,
            total_energy_kwh: 25.0,
            mode: Mode::On,
            energy_today_wh: 100.0,
            grid_current_a: 2.0,
            panel_current_a: 3.8,
            grid_voltage_v: 220.6,
            panel_voltage_v: 116.2,
            grid_frequency_hz: 49.99,
            fault: 0,
            home_usage_current_a: None,
        }
    }

    #[test]
    fn keeps_only_the_current_day() {
        let mut store = MemoryTimeSeries::for_date(
            NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
        );
        store.add_sample(sample(21, 10, 100.0));
        store.add_sample(sample(21, 12, 300.0));
        assert!(store.aggregated_data().is_some());

        // A sample from the next day flushes the window.
        store.add_sample(sample(22, 9, 50.0));
        assert_eq!(store.last_sample().unwrap().power_w, 50.0);
        assert!(store.aggregated_data().is_none());
    }
}
