use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Line rate used by the actuator and pendant nodes.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout of an open link.
///
/// Kept short so a reader waiting on a frame deadline gets control back
/// several times per second even when the line is silent.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Settings applied when a port is opened.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Line rate in bit/s. Default: 115200.
    pub baud_rate: u32,
    /// Timeout for a single blocking read on the port.
    pub read_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Coarse classification of an enumerated port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl PortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PortKind::Usb => "usb",
            PortKind::Pci => "pci",
            PortKind::Bluetooth => "bluetooth",
            PortKind::Unknown => "unknown",
        }
    }
}

impl From<&SerialPortType> for PortKind {
    fn from(value: &SerialPortType) -> Self {
        match value {
            SerialPortType::UsbPort(_) => PortKind::Usb,
            SerialPortType::PciPort => PortKind::Pci,
            SerialPortType::BluetoothPort => PortKind::Bluetooth,
            SerialPortType::Unknown => PortKind::Unknown,
        }
    }
}

/// An enumerated serial port.
#[derive(Debug, Clone)]
pub struct PortSummary {
    pub name: String,
    pub kind: PortKind,
    /// Product or manufacturer string, when the OS reports one.
    pub description: Option<String>,
}

impl From<&SerialPortInfo> for PortSummary {
    fn from(info: &SerialPortInfo) -> Self {
        let description = match &info.port_type {
            SerialPortType::UsbPort(usb) => {
                usb.product.clone().or_else(|| usb.manufacturer.clone())
            }
            _ => None,
        };
        Self {
            name: info.port_name.clone(),
            kind: PortKind::from(&info.port_type),
            description,
        }
    }
}

/// List the serial ports visible to this process.
pub fn available_ports() -> Result<Vec<PortSummary>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.iter().map(PortSummary::from).collect())
}

/// An open serial link to the device.
///
/// Implements `Read + Write`. Reads block for at most the configured read
/// timeout and then fail with `ErrorKind::TimedOut`.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
    /// Longest a single read may block.
    read_timeout: Duration,
    /// Timeout currently set on the port.
    applied_timeout: Duration,
}

impl SerialLink {
    /// Open the named port.
    pub fn open(name: &str, config: &LinkConfig) -> Result<Self> {
        let port = serialport::new(name, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: name.to_string(),
                source,
            })?;
        info!(port = name, baud = config.baud_rate, "serial link opened");
        Ok(Self {
            port,
            name: name.to_string(),
            read_timeout: config.read_timeout,
            applied_timeout: config.read_timeout,
        })
    }

    /// Open the first port that looks like the device.
    pub fn open_discovered(config: &LinkConfig) -> Result<Self> {
        let name = Self::discover()?;
        Self::open(&name, config)
    }

    /// Guess the device port.
    ///
    /// Bluetooth serial ports are never the actuator link and are skipped.
    pub fn discover() -> Result<String> {
        let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
        let port = pick_port(&ports).ok_or(TransportError::NoPortFound)?;
        info!(port = %port.port_name, "guessed serial port");
        Ok(port.port_name.clone())
    }

    /// Port name this link was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the timeout of a single blocking read.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.apply_timeout(timeout)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Shorten the next reads to block for at most `remaining`.
    ///
    /// Never lengthens a read past the configured read timeout. The port is
    /// only reconfigured when the effective timeout changes.
    pub fn limit_read_timeout(&mut self, remaining: Duration) -> Result<()> {
        self.apply_timeout(effective_timeout(self.read_timeout, remaining))
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout == self.applied_timeout {
            return Ok(());
        }
        self.port
            .set_timeout(timeout)
            .map_err(|source| TransportError::Configure {
                port: self.name.clone(),
                source,
            })?;
        self.applied_timeout = timeout;
        Ok(())
    }

    /// Clone the handle so reading and writing can happen on separate threads.
    pub fn try_clone(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|source| TransportError::Configure {
                port: self.name.clone(),
                source,
            })?;
        debug!(port = %self.name, "serial link cloned");
        Ok(Self {
            port,
            name: self.name.clone(),
            read_timeout: self.read_timeout,
            applied_timeout: self.applied_timeout,
        })
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink").field("name", &self.name).finish()
    }
}

/// Shortest timeout set on a port; some drivers treat zero as "block forever".
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

fn effective_timeout(configured: Duration, remaining: Duration) -> Duration {
    remaining.max(MIN_READ_TIMEOUT).min(configured)
}

fn pick_port(ports: &[SerialPortInfo]) -> Option<&SerialPortInfo> {
    ports
        .iter()
        .find(|port| !matches!(port.port_type, SerialPortType::BluetoothPort))
}
