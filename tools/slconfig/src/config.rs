//! Tool configuration
//!
//! Layered with figment: built-in defaults, then `slconfig.yaml` /
//! `slconfig.toml` in the working directory (or the file given with
//! `--config`), then `SLCONFIG_*` environment variables. Command-line flags
//! are applied last by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::LogConfig;
use errors::{config_error, invalid_config, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use slc_protocol::backup::{SizePolicy, DEFAULT_BACKUP_FILE};
use slc_protocol::transport::port_name_for;
use slc_protocol::{ExchangeConfig, FramerConfig, ProtocolVariant, SerialTransportConfig};
use tracing::debug;

/// Environment variable prefix; nested keys use `__` (e.g. `SLCONFIG_SERIAL__BAUD_RATE`)
pub const ENV_PREFIX: &str = "SLCONFIG_";

const DEFAULT_FILES: [&str; 2] = ["slconfig.yaml", "slconfig.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlconfigConfig {
    pub serial: SerialSection,
    pub protocol: ProtocolSection,
    pub exchange: ExchangeSection,
    pub backup: BackupSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// Port number, mapped to a platform device name
    pub port: u32,
    /// Explicit device path; wins over `port`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub baud_rate: u32,
    /// Per-byte read timeout
    pub read_timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: 1,
            device: None,
            baud_rate: 4800,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSection {
    pub variant: ProtocolVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSection {
    pub settle_delay_ms: u64,
    pub edit_delay_ms: u64,
    pub drain_threshold: usize,
    pub max_drain_sentences: usize,
    pub max_idle_reads: u32,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            edit_delay_ms: 300,
            drain_threshold: 6,
            max_drain_sentences: 64,
            max_idle_reads: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    /// File name offered at the backup/restore prompt
    pub default_file: String,
    pub size_policy: SizePolicy,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            default_file: DEFAULT_BACKUP_FILE.to_string(),
            size_policy: SizePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub port: Option<u32>,
    pub baud_rate: Option<u32>,
    pub device: Option<String>,
    pub variant: Option<ProtocolVariant>,
    pub log_level: Option<String>,
}

impl SlconfigConfig {
    /// Figment with defaults, config file(s) and environment merged in order
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(config_error!(
                        "Configuration file not found: {}",
                        path.display()
                    ));
                }
                let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
                figment = match extension {
                    "toml" => figment.merge(Toml::file(path)),
                    "yaml" | "yml" => figment.merge(Yaml::file(path)),
                    _ => {
                        return Err(config_error!(
                            "Unsupported config format: {}",
                            path.display()
                        ))
                    },
                };
            },
            None => {
                debug!("Looking for {:?} in the working directory", DEFAULT_FILES);
                figment = figment
                    .merge(Yaml::file(DEFAULT_FILES[0]))
                    .merge(Toml::file(DEFAULT_FILES[1]));
            },
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from defaults, file(s) and environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(explicit)?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| config_error!("Failed to parse config: {}", e))
    }

    /// Apply command-line values on top of everything else
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            self.serial.port = port;
            // A port number on the command line beats a device path from a file
            if overrides.device.is_none() {
                self.serial.device = None;
            }
        }
        if let Some(baud_rate) = overrides.baud_rate {
            self.serial.baud_rate = baud_rate;
        }
        if let Some(device) = &overrides.device {
            self.serial.device = Some(device.clone());
        }
        if let Some(variant) = overrides.variant {
            self.protocol.variant = variant;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.port == 0 {
            return Err(invalid_config!("serial.port", "Port number must be 1 or greater"));
        }
        if self.serial.baud_rate == 0 {
            return Err(invalid_config!(
                "serial.baud_rate",
                "Baud rate must be greater than zero"
            ));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(invalid_config!(
                "serial.read_timeout_ms",
                "Read timeout must be greater than zero"
            ));
        }
        if self.exchange.max_drain_sentences == 0 {
            return Err(invalid_config!(
                "exchange.max_drain_sentences",
                "At least one sentence must be read per refresh"
            ));
        }
        if self.exchange.max_idle_reads == 0 {
            return Err(invalid_config!(
                "exchange.max_idle_reads",
                "Idle read limit must be 1 or greater"
            ));
        }
        if self.backup.default_file.trim().is_empty() {
            return Err(invalid_config!(
                "backup.default_file",
                "Default backup file name cannot be empty"
            ));
        }
        Ok(())
    }

    /// Device path the serial transport opens
    pub fn device_path(&self) -> String {
        self.serial
            .device
            .clone()
            .unwrap_or_else(|| port_name_for(self.serial.port))
    }

    pub fn serial_transport_config(&self) -> SerialTransportConfig {
        SerialTransportConfig {
            port: self.device_path(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            ..Default::default()
        }
    }

    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            settle_delay: Duration::from_millis(self.exchange.settle_delay_ms),
            edit_delay: Duration::from_millis(self.exchange.edit_delay_ms),
            drain_threshold: self.exchange.drain_threshold,
            max_drain_sentences: self.exchange.max_drain_sentences,
            framer: FramerConfig {
                max_idle_reads: self.exchange.max_idle_reads,
                ..Default::default()
            },
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.logging.level.clone(),
            file: self.logging.file.clone(),
            ..Default::default()
        }
    }
}
