use crate::prelude::*;

use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverter: Inverter,

    #[serde(default)]
    pub timing: Timing,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Optional path for the JSON-lines sample datalog
    pub datalog_file: Option<String>,
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    /// Serial-to-TCP bridge the inverter's RS485 line hangs off
    pub host: String,
    pub port: u16,

    pub read_timeout: Option<u64>,
}

impl Inverter {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn read_timeout(&self) -> u64 {
        self.read_timeout.unwrap_or(5)
    }
} // }}}

// Timing {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Timing {
    /// Seconds between PV data polls while logged in
    #[serde(default = "Timing::default_poll_data_period")]
    pub poll_data_period: u64,

    /// Seconds between connection attempts during the day
    #[serde(default = "Timing::default_check_connection_period_day")]
    pub check_connection_period_day: u64,

    /// Seconds between connection attempts at night
    #[serde(default = "Timing::default_check_connection_period_night")]
    pub check_connection_period_night: u64,

    /// Seconds without a valid sample before night mode is entered
    #[serde(default = "Timing::default_enter_night_mode_after")]
    pub enter_night_mode_after: u64,

    /// Milliseconds between handshake steps
    #[serde(default = "Timing::default_handshake_step_ms")]
    pub handshake_step_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_data_period: Self::default_poll_data_period(),
            check_connection_period_day: Self::default_check_connection_period_day(),
            check_connection_period_night: Self::default_check_connection_period_night(),
            enter_night_mode_after: Self::default_enter_night_mode_after(),
            handshake_step_ms: Self::default_handshake_step_ms(),
        }
    }
}

impl Timing {
    pub fn poll_data_period(&self) -> Duration {
        Duration::from_secs(self.poll_data_period)
    }

    pub fn check_connection_period_day(&self) -> Duration {
        Duration::from_secs(self.check_connection_period_day)
    }

    pub fn check_connection_period_night(&self) -> Duration {
        Duration::from_secs(self.check_connection_period_night)
    }

    pub fn enter_night_mode_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.enter_night_mode_after as i64)
    }

    pub fn handshake_step(&self) -> Duration {
        Duration::from_millis(self.handshake_step_ms)
    }

    fn default_poll_data_period() -> u64 {
        15
    }

    // Less than the night-mode grace time, so a briefly dropped link can
    // re-login without tripping night mode.
    fn default_check_connection_period_day() -> u64 {
        10
    }

    fn default_check_connection_period_night() -> u64 {
        120
    }

    fn default_enter_night_mode_after() -> u64 {
        120
    }

    fn default_handshake_step_ms() -> u64 {
        500
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn inverter(&self) -> Inverter {
        self.config.lock().unwrap().inverter.clone()
    }

    pub fn timing(&self) -> Timing {
        self.config.lock().unwrap().timing.clone()
    }

    pub fn loglevel(&self) -> String {
        self.config.lock().unwrap().loglevel.clone()
    }

    pub fn datalog_file(&self) -> Option<String> {
        self.config.lock().unwrap().datalog_file.clone()
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;

        info!("Configuration loaded:");
        info!("  Inverter: {}:{}", config.inverter.host, config.inverter.port);
        info!("    Read Timeout: {}s", config.inverter.read_timeout());
        info!("  Timing:");
        info!("    Poll Data Period: {}s", config.timing.poll_data_period);
        info!(
            "    Check Connection: {}s day, {}s night",
            config.timing.check_connection_period_day,
            config.timing.check_connection_period_night
        );
        info!(
            "    Enter Night Mode After: {}s",
            config.timing.enter_night_mode_after
        );
        info!("  Log Level: {}", config.loglevel);
        if let Some(path) = &config.datalog_file {
            info!("  Datalog File: {}", path);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverter.host.is_empty() {
            bail!("inverter.host cannot be empty");
        }
        if self.inverter.port == 0 {
            bail!("inverter.port must be between 1 and 65535");
        }
        if self.inverter.read_timeout() == 0 {
            bail!("inverter.read_timeout cannot be 0");
        }
        if self.timing.poll_data_period == 0 {
            bail!("timing.poll_data_period cannot be 0");
        }
        Ok(())
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn minimal_config_gets_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "inverter:\n  host: 10.0.0.10\n  port: 8899")?;

        let config = Config::new(file.path().to_str().unwrap().to_string())?;
        assert_eq!(config.inverter.host(), "10.0.0.10");
        assert_eq!(config.inverter.read_timeout(), 5);
        assert_eq!(config.timing.poll_data_period, 15);
        assert_eq!(config.timing.check_connection_period_day, 10);
        assert_eq!(config.timing.check_connection_period_night, 120);
        assert_eq!(config.loglevel, "info");
        assert!(config.datalog_file.is_none());
        Ok(())
    }

    #[test]
    fn rejects_port_zero() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "inverter:\n  host: 10.0.0.10\n  port: 0")?;

        assert!(Config::new(file.path().to_str().unwrap().to_string()).is_err());
        Ok(())
    }

    #[test]
    fn rejects_zero_poll_period() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "inverter:\n  host: 10.0.0.10\n  port: 8899\ntiming:\n  poll_data_period: 0"
        )?;

        assert!(Config::new(file.path().to_str().unwrap().to_string()).is_err());
        Ok(())
    }
}
