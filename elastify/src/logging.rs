//! Logging setup per connection `logging.driver`
//!
//! - `default`: append to `drivers.default.path` at `drivers.default.level`
//! - `logger`: leave the host application's subscriber in charge; request
//!   events carry the configured `channel` as a span field
//! - unset: nothing is installed
//!
//! `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Which driver ended up active for a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDriver {
    File,
    Channel(String),
    Disabled,
}

impl LogDriver {
    pub fn from_config(config: &LoggingConfig) -> Self {
        match config.driver.as_deref() {
            Some("default") => LogDriver::File,
            Some("logger") => LogDriver::Channel(config.drivers.logger.channel.clone()),
            Some(other) => {
                tracing::debug!("Unknown log driver [{}], logging disabled", other);
                LogDriver::Disabled
            }
            None => LogDriver::Disabled,
        }
    }

    /// Channel name to tag request events with
    pub fn channel(&self) -> Option<&str> {
        match self {
            LogDriver::Channel(channel) => Some(channel.as_str()),
            _ => None,
        }
    }
}

/// Install the subscriber for `config`.
///
/// Returns `true` only when this call installed a global subscriber; a
/// second call (or one racing the host application) is a no-op.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    match LogDriver::from_config(config) {
        LogDriver::File => {
            let file_config = &config.drivers.default;
            if let Some(parent) = file_config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_config.path)?;

            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file_config.level));

            Ok(tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .is_ok())
        }
        LogDriver::Channel(_) | LogDriver::Disabled => Ok(false),
    }
}
