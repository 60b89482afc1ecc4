//! Serial Transport Implementation
//!
//! Blocking serial port link to the controller: 8 data bits, no parity,
//! one stop bit, XON/XOFF flow control and a per-byte read timeout.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use errors::{invalid_config, Result, SlcError};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, warn};

use super::Transport;

/// Device path for a numbered port (`COM<n>` on Windows, `/dev/ttyS<n-1>` elsewhere)
pub fn port_name_for(number: u32) -> String {
    if cfg!(windows) {
        format!("COM{number}")
    } else {
        format!("/dev/ttyS{}", number.saturating_sub(1))
    }
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialTransportConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity ("None", "Even", "Odd")
    pub parity: String,
    /// Flow control ("None", "Software", "Hardware")
    pub flow_control: String,
    /// Per-byte read timeout
    pub read_timeout: Duration,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            port: port_name_for(1),
            baud_rate: 4800,
            data_bits: 8,
            stop_bits: 1,
            parity: "None".to_string(),
            flow_control: "Software".to_string(),
            read_timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialTransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(invalid_config!("serial.port", "Port path cannot be empty"));
        }

        if self.baud_rate == 0 {
            return Err(invalid_config!(
                "serial.baud_rate",
                "Baud rate must be greater than zero"
            ));
        }

        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(invalid_config!(
                "serial.data_bits",
                "Data bits must be 5, 6, 7, or 8"
            ));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(invalid_config!("serial.stop_bits", "Stop bits must be 1 or 2"));
        }

        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(invalid_config!(
                "serial.parity",
                "Parity must be None, Even, or Odd"
            ));
        }

        if !["None", "Software", "Hardware"].contains(&self.flow_control.as_str()) {
            return Err(invalid_config!(
                "serial.flow_control",
                "Flow control must be None, Software, or Hardware"
            ));
        }

        if self.read_timeout.is_zero() {
            return Err(invalid_config!(
                "serial.read_timeout",
                "Read timeout must be greater than zero"
            ));
        }

        Ok(())
    }

    fn parse_parity(&self) -> Parity {
        match self.parity.as_str() {
            "Even" => Parity::Even,
            "Odd" => Parity::Odd,
            _ => Parity::None,
        }
    }

    fn parse_flow_control(&self) -> FlowControl {
        match self.flow_control.as_str() {
            "Software" => FlowControl::Software,
            "Hardware" => FlowControl::Hardware,
            _ => FlowControl::None,
        }
    }

    fn parse_data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parse_stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// Open serial link
pub struct SerialTransport {
    config: SerialTransportConfig,
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open and configure the port; pending buffers are purged
    pub fn open(config: SerialTransportConfig) -> Result<Self> {
        config.validate()?;

        debug!("Opening serial port: {}", config.port);
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(config.parse_data_bits())
            .parity(config.parse_parity())
            .stop_bits(config.parse_stop_bits())
            .flow_control(config.parse_flow_control())
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| SlcError::TransportOpenFailure {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!("Failed to purge {}: {e}", config.port);
        }

        info!(
            "Opened serial port {} at {} baud",
            config.port, config.baud_rate
        );
        Ok(Self { config, port })
    }

    pub fn config(&self) -> &SerialTransportConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.config.port
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(SlcError::transport(format!(
                "Failed to read from {}: {e}",
                self.config.port
            ))),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        self.port
            .write_all(data)
            .and_then(|()| self.port.flush())
            .map_err(|e| {
                SlcError::transport(format!("Failed to write to {}: {e}", self.config.port))
            })?;
        debug!(hex_data = %common::hex::encode_spaced(data), length = data.len(), direction = "send", "[Serial Transport] Raw packet");
        Ok(data.len())
    }

    fn pending_inbound(&mut self) -> Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| SlcError::transport(format!("Failed to query {}: {e}", self.config.port)))
    }
}
