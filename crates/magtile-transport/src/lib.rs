//! Serial transport for MagTile controllers.
//!
//! Owns the platform serial port and exposes raw chunked I/O:
//! - [`SerialPortOpener`] opens a port at the controller's fixed baud rate
//! - [`TransportHandle`] wraps any open stream with read/write/close lifecycle
//! - [`available_ports`] enumerates candidate devices
//! - `AsyncSerialPortOpener` (feature `async`) bridges the port into tokio
//!
//! This is the lowest layer of magtile. Line framing and the command session
//! build on top of the [`TransportHandle`] provided here.

#[cfg(feature = "async")]
pub mod async_serial;
pub mod error;
pub mod handle;
pub mod serial;
pub mod traits;

#[cfg(feature = "async")]
pub use async_serial::AsyncSerialPortOpener;
pub use error::{Result, TransportError};
pub use handle::TransportHandle;
pub use serial::{
    available_ports, PortConfig, PortInfo, PortKind, SerialPortOpener, SerialStream,
    DEFAULT_BAUD_RATE,
};
#[cfg(feature = "async")]
pub use traits::AsyncPortOpener;
pub use traits::{PortOpener, SerialLink};
