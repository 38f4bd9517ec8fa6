//! Connection lifecycle and command exchange for MagTile controllers.
//!
//! This is the host-facing layer. A [`Session`] owns one serial link, drains
//! the power-up banner on connect, and turns each command into exactly one
//! classified reply. Results surface as a [`Reply`] with a status and data
//! string; lower-level errors are available through `send_command`.

#[cfg(feature = "async")]
pub mod async_session;
pub mod config;
pub mod error;
pub mod reply;
pub mod session;
pub mod state;

#[cfg(feature = "async")]
pub use async_session::AsyncSession;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use reply::{Reply, Status, COMMAND_ERROR, CONNECTED, DISCONNECTED, UNKNOWN_RESPONSE};
pub use session::Session;
pub use state::ConnectionState;
