use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{PortOpener, SerialLink};

/// Baud rate the MagTile firmware listens on.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long a single driver read waits before it is retried.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings used to open the controller's serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Device path (e.g. `/dev/ttyACM0`, `COM3`). `None` means no device selected.
    pub path: Option<String>,
    /// Line speed. Default: 115200.
    pub baud_rate: u32,
    /// Driver read timeout. Reads loop on it, so it only bounds how often the
    /// driver is polled, never how long a read may take overall.
    pub poll_interval: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            path: None,
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PortConfig {
    /// Default settings for the device at `path`.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

/// An open serial port.
///
/// The driver's read timeout is hidden: [`Read::read`] keeps waiting until at
/// least one byte arrives or the port reports an error.
pub struct SerialStream {
    port: Box<dyn SerialPort>,
}

impl SerialStream {
    /// Wrap a port opened elsewhere.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Device name as reported by the driver.
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    /// A second handle to the same port, for a dedicated reader.
    pub fn try_clone(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|err| TransportError::Io(err.into()))?;
        Ok(Self { port })
    }

    /// A single driver read. Fails with `TimedOut` once the poll interval
    /// passes without data.
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn read_once(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            match self.port.read(buf) {
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialStream {
    fn discard_input(&mut self) -> std::io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(Into::into)
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("name", &self.port.name())
            .finish()
    }
}

/// Opens the configured serial device at 8N1 without flow control.
#[derive(Debug, Clone, Default)]
pub struct SerialPortOpener {
    config: PortConfig,
}

impl SerialPortOpener {
    pub fn new(config: PortConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

impl PortOpener for SerialPortOpener {
    type Stream = SerialStream;

    fn open(&self) -> Result<SerialStream> {
        let path = match self.config.path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => path,
            _ => return Err(TransportError::NoDeviceSelected),
        };

        let port = serialport::new(path, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.poll_interval)
            .open()
            .map_err(|err| open_error(path, err))?;

        info!(path, baud_rate = self.config.baud_rate, "opened serial port");
        Ok(SerialStream::from_port(port))
    }
}

fn open_error(path: &str, err: serialport::Error) -> TransportError {
    match err.kind() {
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => TransportError::PermissionDenied {
            path: path.to_string(),
        },
        _ => TransportError::Open {
            path: path.to_string(),
            source: err,
        },
    }
}

/// Broad category of a discovered port.
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

/// A serial device found on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
    /// USB product string, when the driver exposes one.
    pub product: Option<String>,
}

/// List serial devices the controller might be attached to.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product) = match port.port_type {
                SerialPortType::UsbPort(usb) => (PortKind::Usb, usb.product),
                SerialPortType::PciPort => (PortKind::Pci, None),
                SerialPortType::BluetoothPort => (PortKind::Bluetooth, None),
                SerialPortType::Unknown => (PortKind::Unknown, None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                product,
            }
        })
        .collect())
}
