//! Host-side control of MagTile magnetic tile controllers.
//!
//! A MagTile controller is an Arduino-class board driving a grid of tiles. It
//! speaks a newline-terminated text protocol over a serial port.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial port discovery and the raw byte transport
//! - [`line`]: line framing, command encoding, and reply classification
//! - [`session`]: connection lifecycle and one-command-one-reply exchange
//!
//! ```no_run
//! use magtile::session::Session;
//! use magtile::transport::{PortConfig, SerialPortOpener};
//!
//! let opener = SerialPortOpener::new(PortConfig::for_path("/dev/ttyACM0"));
//! let mut session = Session::new(opener);
//! session.connect();
//! println!("{:?}", session.read_width());
//! session.disconnect();
//! ```

/// Re-export transport types.
pub mod transport {
    pub use magtile_transport::*;
}

/// Re-export line protocol types.
pub mod line {
    pub use magtile_line::*;
}

/// Re-export session types.
pub mod session {
    pub use magtile_session::*;
}
