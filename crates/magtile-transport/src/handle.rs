use std::io::{ErrorKind, Read, Write};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{PortOpener, SerialLink};

/// Owns an open device stream for the lifetime of a connection.
///
/// Reads and writes are raw bytes; decoding lines is the framer's job.
/// Once [`close`](Self::close) has run, every further read or write fails
/// with [`TransportError::Closed`] and further closes are no-ops.
pub struct TransportHandle<S> {
    inner: Option<S>,
}

impl<S: SerialLink> TransportHandle<S> {
    /// Wrap an already-open stream.
    pub fn new(inner: S) -> Self {
        Self { inner: Some(inner) }
    }

    /// Open a stream through `opener` and wrap it.
    pub fn open<O>(opener: &O) -> Result<Self>
    where
        O: PortOpener<Stream = S>,
    {
        let stream = opener.open()?;
        debug!("transport opened");
        Ok(Self::new(stream))
    }

    /// Whether the handle still owns a stream.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Read the next chunk of raw bytes (blocking).
    ///
    /// Returns `Ok(0)` once the peer has closed the stream. `buf` must not be
    /// empty, otherwise end of stream cannot be told apart from a short read.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inner = self.inner.as_mut().ok_or(TransportError::Closed)?;
        loop {
            match inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Hand `bytes` to the underlying channel and flush it (blocking).
    ///
    /// Completion only means the OS accepted the bytes, not that the device
    /// has processed them.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(TransportError::Closed)?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Release the stream: flush pending output, discard unread input, then
    /// drop the port.
    ///
    /// The first failing step is reported, but the port is released either
    /// way. Closing an already-closed handle succeeds.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };

        let result = inner.flush().and_then(|()| inner.discard_input());
        drop(inner);

        match result {
            Ok(()) => {
                debug!("transport closed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "transport closed with error");
                Err(TransportError::Io(err))
            }
        }
    }

    /// Borrow the underlying stream, if still open.
    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    /// Mutably borrow the underlying stream, if still open.
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.inner.as_mut()
    }
}

impl<S: SerialLink> Read for TransportHandle<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_chunk(buf).map_err(|err| match err {
            TransportError::Io(io) => io,
            TransportError::Closed => {
                std::io::Error::new(ErrorKind::NotConnected, "transport closed")
            }
            other => std::io::Error::other(other.to_string()),
        })
    }
}

impl<S> std::fmt::Debug for TransportHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("open", &self.inner.is_some())
            .finish()
    }
}
