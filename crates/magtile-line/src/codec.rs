use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::command::Command;
use crate::error::{FramingError, Result};

/// Line terminator in both directions.
pub const NEWLINE: u8 = b'\n';

/// Default cap on bytes buffered without seeing a newline: 4 KiB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4 * 1024;

/// Encode a command into its wire form.
///
/// Wire format:
/// ```text
/// <verb> SP <arg1> SP <arg2> ... LF
/// ```
/// Tokens are validated first; nothing is written to `dst` on error.
pub fn encode_command(command: &Command, dst: &mut BytesMut) -> Result<()> {
    command.validate()?;

    let len = command.verb().len()
        + command.args().iter().map(|arg| arg.len() + 1).sum::<usize>()
        + 1;
    dst.reserve(len);
    dst.put_slice(command.verb().as_bytes());
    for arg in command.args() {
        dst.put_u8(b' ');
        dst.put_slice(arg.as_bytes());
    }
    dst.put_u8(NEWLINE);
    Ok(())
}

/// Decode one line from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a newline yet. On success the
/// line and its terminator are consumed and the text is returned with
/// surrounding whitespace trimmed; any bytes after the newline stay buffered.
///
/// Bytes are only decoded once a whole line is present, so a multi-byte
/// character split across reads is reassembled before decoding. Invalid UTF-8
/// is replaced rather than rejected.
pub fn decode_line(src: &mut BytesMut, max_line_length: usize) -> Result<Option<String>> {
    let Some(pos) = src.iter().position(|&b| b == NEWLINE) else {
        if src.len() > max_line_length {
            let len = src.len();
            src.clear();
            return Err(FramingError::LineTooLong {
                len,
                max: max_line_length,
            });
        }
        return Ok(None); // Need more data
    };

    if pos > max_line_length {
        src.advance(pos + 1);
        return Err(FramingError::LineTooLong {
            len: pos,
            max: max_line_length,
        });
    }

    let line = src.split_to(pos + 1);
    let text = String::from_utf8_lossy(&line[..pos]);
    Ok(Some(text.trim().to_string()))
}

/// Stateful line decoder shared by the blocking framer and the tokio codec.
///
/// [`decode_line`] alone cannot tell where an over-long line ends when its
/// newline has not arrived yet. After that case the decoder keeps discarding
/// input up to and including the next newline, so the tail of the rejected
/// line is never returned as a line of its own.
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    config: LineConfig,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(config: LineConfig) -> Self {
        Self {
            config,
            discarding: false,
        }
    }

    /// Decode the next line, skipping the remainder of a rejected line first.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if self.discarding {
            let Some(pos) = src.iter().position(|&b| b == NEWLINE) else {
                trace!(discarded = src.len(), "dropping rest of over-long line");
                src.clear();
                return Ok(None);
            };
            src.advance(pos + 1);
            self.discarding = false;
        }

        let terminated = src.contains(&NEWLINE);
        let decoded = decode_line(src, self.config.max_line_length);
        if decoded.is_err() && !terminated {
            self.discarding = true;
        }
        decoded
    }

    /// Whether the decoder is skipping the tail of an over-long line.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    /// Forget any line being discarded.
    pub fn reset(&mut self) {
        self.discarding = false;
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    pub fn set_max_line_length(&mut self, max_line_length: usize) {
        self.config.max_line_length = max_line_length;
    }
}

/// Configuration for line framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    /// Maximum bytes held without a newline. Default: 4 KiB.
    pub max_line_length: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}
