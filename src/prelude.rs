pub use crate::channels::Channels;
pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::options::Options;
pub use crate::utils::Utils;

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;
pub use tokio::sync::broadcast;
