//! Serial port configuration and connection to the glitcher
//!
//! Handles port discovery and the `serialport`-backed [`Channel`].

use super::Channel;
use crate::error::{Error, Result};
use anyhow::Context;
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Default glitcher baud rate
pub const DEFAULT_BAUD: u32 = 115200;

/// Default read timeout, also used as the sweep pacing interval
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for serial port connection
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyACM0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default 8N1 settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Open connection to the glitcher
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|source| Error::Open {
                port: config.port_path.clone(),
                source,
            })?;

        log::info!(
            "Opened serial port: {} at {} baud",
            config.port_path,
            config.baud_rate
        );

        Ok(Self { port, config })
    }

    /// Get the port configuration
    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

impl Channel for SerialConnection {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.port.read(buffer)?)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.port.write_all(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }
}

/// A serial port the OS reports, with a one-line description of what sits behind it
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub description: String,
}

fn describe(kind: &serialport::SerialPortType) -> String {
    match kind {
        serialport::SerialPortType::UsbPort(usb) => {
            let mut text = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
            for part in [&usb.manufacturer, &usb.product].into_iter().flatten() {
                text.push(' ');
                text.push_str(part);
            }
            text
        }
        serialport::SerialPortType::PciPort => "PCI".to_string(),
        serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}

/// List all available serial ports
pub fn list_ports() -> anyhow::Result<Vec<PortInfo>> {
    let ports =
        serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            description: describe(&p.port_type),
            path: p.port_name,
        })
        .collect())
}

/// Print one line per available serial port, for `--list-ports`
pub fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        return Ok(());
    }
    for port in ports {
        println!("{}  {}", port.path.white().bold(), port.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new("/dev/ttyUSB1")
            .with_baud_rate(9600)
            .with_timeout(Duration::from_millis(250));

        assert_eq!(config.port_path, "/dev/ttyUSB1");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_describe_port_kinds() {
        assert_eq!(describe(&serialport::SerialPortType::PciPort), "PCI");
        assert_eq!(describe(&serialport::SerialPortType::BluetoothPort), "Bluetooth");
        assert_eq!(describe(&serialport::SerialPortType::Unknown), "unknown");
    }

    #[test]
    fn test_open_missing_port_reports_path() {
        let err = SerialConnection::open(PortConfig::new("/dev/does-not-exist-glitcher"))
            .err()
            .expect("opening a missing port must fail");
        assert!(err.to_string().contains("/dev/does-not-exist-glitcher"));
    }
}
