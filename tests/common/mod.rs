#![allow(dead_code)]

use samil_bridge::config::{self, Config};
use samil_bridge::line::{HalfDuplexLine, LineError};
use samil_bridge::notification::{Notifier, StatusEntry, StatusHandle};
use samil_bridge::power::{Mode, PowerData};
use samil_bridge::samil::message::{templates, Message};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Device id the fake inverter announces, as captured from real hardware.
pub const DEVICE_ID: &[u8] = b"AS514BX039";

pub struct Factory;

impl Factory {
    /// The 50-byte PV data payload captured from a logged-in inverter:
    /// panel 116.2 V / 3.8 A, mode ON, 800 Wh today, no fault, grid
    /// 2.0 A / 220.6 V / 49.99 Hz / 450 W, 25.0 kWh lifetime.
    pub fn pv_payload() -> Vec<u8> {
        let mut payload = vec![0u8; 50];
        payload[2] = 0x04; // panel voltage, 1162
        payload[3] = 0x8a;
        payload[4] = 0x00; // panel current, 38
        payload[5] = 0x26;
        payload[11] = 0x01; // mode, ON
        payload[13] = 0x50; // energy today, 80
        payload[38] = 0x00; // grid current, 20
        payload[39] = 0x14;
        payload[40] = 0x08; // grid voltage, 2206
        payload[41] = 0x9e;
        payload[42] = 0x13; // grid frequency, 4999
        payload[43] = 0x87;
        payload[44] = 0x01; // grid power, 450
        payload[45] = 0xc2;
        payload[48] = 0x00; // total energy, 250
        payload[49] = 0xfa;
        payload
    }

    pub fn pv_response_frame() -> Vec<u8> {
        templates::GET_PV_DATA_RESPONSE
            .with_payload(Self::pv_payload())
            .to_bytes()
    }

    pub fn broadcast_response_frame() -> Vec<u8> {
        templates::BROADCAST_RESPONSE
            .with_payload(DEVICE_ID.to_vec())
            .to_bytes()
    }

    pub fn fw_version_payload() -> Vec<u8> {
        b"1  1100V1.30   SR 1100TL-S\0 SamilPower\0     AS514BX039\0\0\0\0\0\0".to_vec()
    }

    pub fn timestamp(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 6, 21, hour, min, sec)
            .unwrap()
    }

    pub fn sample(hour: u32, min: u32, power_w: f64, energy_today_wh: f64) -> PowerData {
        PowerData {
            timestamp: Self::timestamp(hour, min, 0),
            power_w,
            total_energy_kwh: 25.0,
            mode: Mode::On,
            energy_today_wh,
            grid_current_a: 2.0,
            panel_current_a: 3.8,
            grid_voltage_v: 220.6,
            panel_voltage_v: 116.2,
            grid_frequency_hz: 49.99,
            fault: 0,
            home_usage_current_a: None,
        }
    }

    /// Config with all scheduler pacing collapsed to zero, for driving the
    /// loop in tests.
    pub fn fast_config() -> Config {
        Config {
            inverter: config::Inverter {
                host: "127.0.0.1".to_string(),
                port: 8899,
                read_timeout: Some(1),
            },
            timing: config::Timing {
                poll_data_period: 0,
                check_connection_period_day: 0,
                check_connection_period_night: 0,
                enter_night_mode_after: 0,
                handshake_step_ms: 0,
            },
            loglevel: "debug".to_string(),
            datalog_file: None,
        }
    }
}

/// Line whose responses are scripted ahead of time; every frame sent is
/// recorded alongside the operation name.
pub struct ScriptedLine {
    pub script: VecDeque<Result<Vec<u8>, LineError>>,
    pub sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl ScriptedLine {
    pub fn new(script: Vec<Result<Vec<u8>, LineError>>) -> Self {
        Self {
            script: script.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent_ops(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
    }
}

#[async_trait]
impl HalfDuplexLine for ScriptedLine {
    async fn send_receive(&mut self, request: &[u8], op: &str) -> Result<Vec<u8>, LineError> {
        self.sent
            .lock()
            .unwrap()
            .push((op.to_string(), request.to_vec()));
        self.script.pop_front().unwrap_or(Err(LineError::Timeout))
    }

    async fn send(&mut self, request: &[u8], op: &str) -> Result<(), LineError> {
        self.sent
            .lock()
            .unwrap()
            .push((op.to_string(), request.to_vec()));
        Ok(())
    }
}

/// Line with nothing on the other end; every exchange fails immediately.
pub struct DeadLine;

#[async_trait]
impl HalfDuplexLine for DeadLine {
    async fn send_receive(&mut self, _request: &[u8], _op: &str) -> Result<Vec<u8>, LineError> {
        Err(LineError::Offline)
    }

    async fn send(&mut self, _request: &[u8], _op: &str) -> Result<(), LineError> {
        Err(LineError::Offline)
    }
}

/// Protocol-level fake of the inverter: answers each request the way the
/// real firmware does, and only when the session state allows it.
pub struct FakeInverter {
    pub logged_in: bool,
}

impl FakeInverter {
    pub fn new() -> Self {
        Self { logged_in: false }
    }

    fn respond(&mut self, request: &Message) -> Option<Message> {
        match (request.cmd(), request.subcmd()) {
            (0, 0x00) if !self.logged_in => {
                Some(templates::BROADCAST_RESPONSE.with_payload(DEVICE_ID.to_vec()))
            }
            (0, 0x01) => {
                let mut expected = DEVICE_ID.to_vec();
                expected.push(templates::ALLOCATED_ADDRESS as u8);
                if request.payload != expected {
                    return None;
                }
                self.logged_in = true;
                Some(templates::LOGIN_RESPONSE.clone())
            }
            (1, 0x00) if self.logged_in => Some(templates::UNKNOWN_RESPONSE_1.clone()),
            (1, 0x01) if self.logged_in => Some(templates::UNKNOWN_RESPONSE_2.clone()),
            (1, 0x02) if self.logged_in => {
                Some(templates::GET_PV_DATA_RESPONSE.with_payload(Factory::pv_payload()))
            }
            (1, 0x03) if self.logged_in => {
                Some(templates::GET_FW_VERSION_RESPONSE.with_payload(Factory::fw_version_payload()))
            }
            (1, 0x04) if self.logged_in => Some(templates::GET_CONF_INFO_RESPONSE.clone()),
            _ => None,
        }
    }
}

impl Default for FakeInverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HalfDuplexLine for FakeInverter {
    async fn send_receive(&mut self, request: &[u8], _op: &str) -> Result<Vec<u8>, LineError> {
        let request = Message::from_bytes(request).map_err(|_| LineError::Timeout)?;
        match self.respond(&request) {
            Some(response) => Ok(response.to_bytes()),
            None => Err(LineError::Timeout),
        }
    }

    async fn send(&mut self, request: &[u8], _op: &str) -> Result<(), LineError> {
        if let Ok(request) = Message::from_bytes(request) {
            if request.check_structure(&templates::LOGOUT_MESSAGE) {
                self.logged_in = false;
            }
        }
        Ok(())
    }
}

/// Notifier that keeps every entry alive and records all mails.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub entries: Arc<Mutex<Vec<Arc<Mutex<StatusEntry>>>>>,
    pub mails: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.lock().unwrap().text.clone())
            .collect()
    }

    pub fn mail_count(&self) -> usize {
        self.mails.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn enqueue_status_update(&mut self, title: &str, text: &str) -> StatusHandle {
        let entry = Arc::new(Mutex::new(StatusEntry {
            title: title.to_string(),
            text: text.to_string(),
            timestamp: Local::now(),
        }));
        let handle = StatusHandle::for_entry(&entry);
        self.entries.lock().unwrap().push(entry);
        handle
    }

    fn send_mail(&mut self, title: &str, body: &str, _is_html: bool) {
        self.mails
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

/// Notifier that forgets entries immediately: every handle comes back dead.
#[derive(Clone, Default)]
pub struct DroppingNotifier {
    pub posted: Arc<Mutex<Vec<(String, String)>>>,
}

impl DroppingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Notifier for DroppingNotifier {
    fn enqueue_status_update(&mut self, title: &str, text: &str) -> StatusHandle {
        self.posted
            .lock()
            .unwrap()
            .push((title.to_string(), text.to_string()));
        let entry = Arc::new(Mutex::new(StatusEntry {
            title: title.to_string(),
            text: text.to_string(),
            timestamp: Local::now(),
        }));
        StatusHandle::for_entry(&entry)
    }

    fn send_mail(&mut self, _title: &str, _body: &str, _is_html: bool) {}
}
