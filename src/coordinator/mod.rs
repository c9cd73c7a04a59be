use crate::prelude::*;

use crate::ammeter::Ammeter;
use crate::datalog_writer::DatalogWriter;
use crate::fault::FaultTracker;
use crate::line::HalfDuplexLine;
use crate::notification::Notifier;
use crate::power::{DayPowerData, PowerData};
use crate::samil::message::templates;
use crate::samil::{protocol, telemetry};
use crate::status::SolarStatus;
use crate::storage::TimeSeries;

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Where the link currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkMode {
    Disconnected,
    LoggingIn,
    Polling,
}

/// Process-wide state of the bridge, mutated only by the coordinator loop
/// and shared out for status queries and tests.
#[derive(Debug)]
pub struct ConnectionState {
    pub mode: LinkMode,
    pub night_mode: bool,
    pub last_valid_data: DateTime<Local>,
    pub last_fault: u16,
    /// Latch against duplicate daily mails. Starts set so a process started
    /// at night does not mail an empty summary on its first transition.
    pub summary_sent: bool,
    pub night_transitions: u64,
    pub samples_stored: u64,
    pub immediate: Option<PowerData>,
    pub last_grid_voltage_v: f64,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            mode: LinkMode::Disconnected,
            night_mode: false,
            last_valid_data: Local::now(),
            last_fault: 0,
            summary_sent: true,
            night_transitions: 0,
            samples_stored: 0,
            immediate: None,
            last_grid_voltage_v: -1.0,
        }
    }
}

/// The bridge's single worker. Alternates between connection checks (run the
/// login handshake) and data polls depending on connectivity, infers
/// day/night from the absence of valid samples, and owns the shutdown
/// lifecycle. All protocol state lives here; nothing below it is fatal.
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    line: Box<dyn HalfDuplexLine>,
    storage: Box<dyn TimeSeries>,
    notifier: Box<dyn Notifier>,
    ammeter: Option<Box<dyn Ammeter>>,
    datalog: Option<DatalogWriter>,
    fault_tracker: FaultTracker,
    pub shared_state: Arc<Mutex<ConnectionState>>,
}

impl Coordinator {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        line: Box<dyn HalfDuplexLine>,
        storage: Box<dyn TimeSeries>,
        notifier: Box<dyn Notifier>,
        ammeter: Option<Box<dyn Ammeter>>,
        datalog: Option<DatalogWriter>,
    ) -> Self {
        Self {
            config,
            channels,
            line,
            storage,
            notifier,
            ammeter,
            datalog,
            fault_tracker: FaultTracker::new(),
            shared_state: Arc::new(Mutex::new(ConnectionState::new())),
        }
    }

    /// Runs until a shutdown signal arrives, then performs a best-effort
    /// clean logout. Waits are cancellable; an in-flight exchange is left to
    /// complete or time out on its own.
    pub async fn start(&mut self) -> Result<()> {
        let mut shutdown = self.channels.shutdown.subscribe();

        loop {
            let wait = self.next_wait();
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if self.in_connection_mode() {
                self.check_connection().await;
            } else {
                self.poll_data().await;
            }
        }

        info!("shutting down, logging out");
        protocol::logout_inverter(self.line.as_mut(), self.config.timing().handshake_step()).await;
        Ok(())
    }

    pub fn immediate_data(&self) -> Option<PowerData> {
        self.shared_state.lock().unwrap().immediate.clone()
    }

    pub fn status(&self) -> SolarStatus {
        let state = self.shared_state.lock().unwrap();
        let mut status = SolarStatus {
            online: state.mode == LinkMode::Polling,
            grid_v: state.last_grid_voltage_v,
            ..SolarStatus::default()
        };

        if let Some(last) = self.storage.last_sample() {
            status.current_w = last.power_w;
            status.current_ts = last.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
            status.total_day_wh = last.energy_today_wh;
            status.total_kwh = last.total_energy_kwh;
            status.mode = Some(last.mode);
            status.fault = last.fault;
            // Recovering from a reboot: no live voltage yet, fall back to
            // the stored sample's.
            if status.grid_v <= 0.0 && last.grid_voltage_v > 0.0 {
                status.grid_v = last.grid_voltage_v;
            }
        }

        if let Some(day) = self.storage.aggregated_data() {
            status.peak_w = day.peak_power_w;
            status.peak_ts_time = day.peak_timestamp.format("%H:%M:%S").to_string();
        }

        status.usage_a = state
            .immediate
            .as_ref()
            .and_then(|data| data.home_usage_current_a);
        status
    }

    fn in_connection_mode(&self) -> bool {
        self.shared_state.lock().unwrap().mode != LinkMode::Polling
    }

    fn next_wait(&self) -> Duration {
        let timing = self.config.timing();
        let state = self.shared_state.lock().unwrap();
        if state.mode == LinkMode::Polling {
            timing.poll_data_period()
        } else if state.night_mode {
            timing.check_connection_period_night()
        } else {
            timing.check_connection_period_day()
        }
    }

    async fn check_connection(&mut self) {
        let night_mode = {
            let mut state = self.shared_state.lock().unwrap();
            state.mode = LinkMode::LoggingIn;
            state.night_mode
        };

        let pacing = self.config.timing().handshake_step();
        if protocol::login_inverter(self.line.as_mut(), night_mode, pacing).await {
            self.set_night_mode(false);
            self.shared_state.lock().unwrap().mode = LinkMode::Polling;
            info!("logged in, polling for data");
        } else {
            let last_valid = {
                let mut state = self.shared_state.lock().unwrap();
                state.mode = LinkMode::Disconnected;
                state.last_valid_data
            };
            if Local::now() - last_valid > self.config.timing().enter_night_mode_after() {
                self.set_night_mode(true);
            }
        }
    }

    async fn poll_data(&mut self) {
        let response = protocol::check_protocol(
            self.line.as_mut(),
            "pv",
            &templates::GET_PV_DATA_MESSAGE,
            &templates::GET_PV_DATA_RESPONSE,
            false,
            false,
        )
        .await;

        let Some(response) = response else {
            // Anything wrong with the exchange forces a relogin.
            self.shared_state.lock().unwrap().mode = LinkMode::Disconnected;
            return;
        };

        let Some(mut data) = telemetry::decode_pv_payload(&response.payload, Local::now()) else {
            warn!(
                "invalid/unknown pv data: {}",
                Utils::hex_string(&response.payload)
            );
            return;
        };

        // Net metering needs the household draw alongside the grid feed.
        if data.grid_voltage_v > 0.0 {
            if let Some(ammeter) = self.ammeter.as_mut() {
                data.home_usage_current_a = ammeter.read_current().await;
            }
        }

        if let Some(datalog) = &self.datalog {
            if let Err(err) = datalog.write_sample(&data) {
                warn!("datalog write failed: {}", err);
            }
        }
        self.storage.add_sample(data.clone());
        self.fault_tracker.observe(data.fault, self.notifier.as_mut());

        let mut state = self.shared_state.lock().unwrap();
        if data.power_w > 0.0 {
            // Producing again: re-arm the next daily mail.
            state.summary_sent = false;
        }
        state.last_fault = data.fault;
        state.last_valid_data = Local::now();
        state.samples_stored += 1;
        if data.grid_voltage_v > 0.0 {
            state.last_grid_voltage_v = data.grid_voltage_v;
        }
        state.immediate = Some(data);
    }

    fn set_night_mode(&mut self, value: bool) {
        let changed = {
            let mut state = self.shared_state.lock().unwrap();
            if state.night_mode != value {
                state.night_mode = value;
                if value {
                    state.night_transitions += 1;
                }
                true
            } else {
                false
            }
        };
        if !changed {
            return;
        }

        info!("night mode: {}", value);
        if value {
            // Day -> night: flush the pending daily summary, at most once.
            let summary = self.storage.aggregated_data();
            let pending = !self.shared_state.lock().unwrap().summary_sent;
            if let Some(summary) = summary {
                if pending {
                    self.send_summary_mail(&summary);
                    self.shared_state.lock().unwrap().summary_sent = true;
                }
            }
        }
    }

    fn send_summary_mail(&mut self, day: &DayPowerData) {
        let sun = day.sun_time();
        let title = format!("Solar production today: {:.1} kWh", day.power_kwh);
        let body = format!(
            "Total energy: {:.1} kWh\n\
             Peak power: {:.0} W at {}\n\
             Sun window: {} - {} ({}h {:02}m)",
            day.power_kwh,
            day.peak_power_w,
            day.peak_timestamp.format("%H:%M:%S"),
            day.first.format("%H:%M:%S"),
            day.last.format("%H:%M:%S"),
            sun.num_hours(),
            sun.num_minutes() % 60,
        );
        self.notifier.send_mail(&title, &body, false);
        info!("daily mail sent, power {:.2} kWh", day.power_kwh);
    }
}
