use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{LineConfig, LineDecoder};
use crate::error::{FramingError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;
const READ_CHUNK_SIZE: usize = 1024;

/// Turns raw byte chunks into complete, trimmed text lines.
///
/// The framer owns only the partial-line buffer; the byte source is passed to
/// each [`next_line`](Self::next_line) call. Bytes after a newline stay
/// buffered for the next call, so one framer must be kept for the lifetime of
/// a connection.
///
/// After a [`FramingError::LineTooLong`] the rest of the rejected line is
/// skipped on the following calls, up to and including its newline.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    decoder: LineDecoder,
}

impl LineFramer {
    /// Create a framer with default configuration.
    pub fn new() -> Self {
        Self::with_config(LineConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: LineConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: LineDecoder::new(config),
        }
    }

    /// Read the next complete line (blocking).
    ///
    /// Returns `Err(FramingError::StreamClosed)` when the source reaches end
    /// of stream before a newline; any partial line is dropped.
    pub fn next_line<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<String> {
        loop {
            if let Some(line) = self.decoder.decode(&mut self.buf)? {
                trace!(line = %line, remaining = self.buf.len(), "framed line");
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match source.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FramingError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    debug!(discarded = self.buf.len(), "stream closed mid-line");
                }
                self.buf.clear();
                return Err(FramingError::StreamClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet emitted as a line.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Drop any partial line, including one being skipped as over-long.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.decoder.reset();
    }

    /// Update the maximum line length for subsequent reads.
    pub fn set_max_line_length(&mut self, max_line_length: usize) {
        self.decoder.set_max_line_length(max_line_length);
    }

    /// Current framer configuration.
    pub fn config(&self) -> &LineConfig {
        self.decoder.config()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
