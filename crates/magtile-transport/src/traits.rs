use std::io::{Read, Write};

use crate::error::Result;

/// A duplex byte stream that can sit underneath a [`TransportHandle`].
///
/// Serial ports are the production implementation; Unix socket pairs and
/// in-memory doubles stand in for a device in tests.
///
/// [`TransportHandle`]: crate::TransportHandle
pub trait SerialLink: Read + Write {
    /// Drop any received bytes that have not been read yet.
    ///
    /// Called while closing so a stale reply cannot leak into the next session.
    fn discard_input(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl SerialLink for std::os::unix::net::UnixStream {}

/// Acquires a fresh stream each time a session connects.
pub trait PortOpener {
    /// The stream type produced by this opener.
    type Stream: SerialLink;

    /// Open the device.
    fn open(&self) -> Result<Self::Stream>;
}

impl<F, S> PortOpener for F
where
    F: Fn() -> Result<S>,
    S: SerialLink,
{
    type Stream = S;

    fn open(&self) -> Result<S> {
        self()
    }
}

/// Async counterpart of [`PortOpener`] for tokio-based sessions.
#[cfg(feature = "async")]
#[allow(async_fn_in_trait)]
pub trait AsyncPortOpener {
    /// The stream type produced by this opener.
    type Stream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin;

    /// Open the device.
    async fn open(&self) -> Result<Self::Stream>;
}
