use crate::power::PowerData;
use crate::prelude::*;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Appends every decoded sample to a JSON-lines file, one object per poll.
#[derive(Debug, Clone)]
pub struct DatalogWriter {
    file: Arc<Mutex<std::fs::File>>,
    path: String,
    samples_written: Arc<Mutex<u64>>,
}

impl DatalogWriter {
    pub fn new(path: &str) -> Result<Self> {
        info!("Opening datalog file at {}", path);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
        }

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_string(),
            samples_written: Arc::new(Mutex::new(0)),
        })
    }

    pub fn write_sample(&self, sample: &PowerData) -> Result<()> {
        let mut record = serde_json::to_value(sample)?;
        if let Some(map) = record.as_object_mut() {
            map.insert(
                "utc_timestamp".to_string(),
                serde_json::Value::Number(sample.timestamp.timestamp().into()),
            );
        }
        let line = serde_json::to_string(&record)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("Failed to lock datalog file"))?;
        if let Err(err) = writeln!(file, "{}", line) {
            error!("Failed to write to datalog file {}: {}", self.path, err);
            return Err(err.into());
        }
        file.flush()?;

        let mut samples_written = self
            .samples_written
            .lock()
            .map_err(|_| anyhow!("Failed to lock sample counter"))?;
        *samples_written += 1;
        debug!("{} samples stored in datalog file", *samples_written);

        Ok(())
    }
}
