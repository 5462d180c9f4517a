//! # Configuration Management Module
//!
//! Centralized configuration for the diagnostic tools: serial line settings,
//! responder/beacon pacing, and logging. Values load from a TOML file and can
//! be overridden per-invocation by CLI flags, following a clear precedence
//! order: CLI args > config file > defaults.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB1"
//! baud_rate = 115200
//! rts485 = false
//!
//! [responder]
//! read_chunk = 256
//! response_delay_ms = 1000
//!
//! [beacon]
//! burst_gap_ms = 300
//! interval_ms = 1000
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::serial::SUPPORTED_BAUDS;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub serial: SerialConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub beacon: BeaconConfig,
    pub logging: LoggingConfig,
}

/// Serial line settings (8N1 is fixed; only the device, speed, and RS-485
/// transmit-enable control are selectable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. /dev/ttyUSB1
    pub port: String,
    /// Line speed. Must be one of the supported rates; see [`SUPPORTED_BAUDS`].
    pub baud_rate: u32,
    /// RS-485 half-duplex transmit-enable control: assert DTR, drop RTS after open.
    #[serde(default)]
    pub rts485: bool,
}

/// Responder daemon pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Maximum bytes consumed per read call. One read is one frame.
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    /// Delay between receiving a chunk and transmitting the response (ms).
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
}

fn default_read_chunk() -> usize {
    256
}

fn default_response_delay_ms() -> u64 {
    1000
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            read_chunk: default_read_chunk(),
            response_delay_ms: default_response_delay_ms(),
        }
    }
}

/// Beacon transmit cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Gap between the two sample frames of a burst (ms).
    #[serde(default = "default_burst_gap_ms")]
    pub burst_gap_ms: u64,
    /// Sleep between bursts (ms).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_burst_gap_ms() -> u64 {
    300
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            burst_gap_ms: default_burst_gap_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the serial tools cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(anyhow!("serial.port must not be empty"));
        }
        if !SUPPORTED_BAUDS.contains(&self.serial.baud_rate) {
            return Err(anyhow!(
                "unsupported baud rate {} (supported: {:?})",
                self.serial.baud_rate,
                SUPPORTED_BAUDS
            ));
        }
        if self.responder.read_chunk == 0 {
            return Err(anyhow!("responder.read_chunk must be nonzero"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            serial: SerialConfig {
                port: "/dev/ttyUSB1".to_string(),
                baud_rate: 115200,
                rts485: false,
            },
            responder: ResponderConfig::default(),
            beacon: BeaconConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}
