use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_command, LineConfig, LineDecoder};
use crate::command::Command;
use crate::error::FramingError;

/// [`tokio_util::codec`] adapter for the line protocol.
///
/// Decodes into trimmed lines and encodes [`Command`]s, using the same rules
/// as [`LineFramer`](crate::LineFramer) and [`encode_command`].
///
/// `LineTooLong` is recoverable at this layer: the codec skips the rest of
/// the rejected line and keeps decoding. A `Framed` stream still ends once
/// after any decoder error, so callers that want to continue must rebuild it
/// from its parts.
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    decoder: LineDecoder,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LineConfig) -> Self {
        Self {
            decoder: LineDecoder::new(config),
        }
    }

    pub fn config(&self) -> &LineConfig {
        self.decoder.config()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None if buf.is_empty() => Ok(None),
            None => {
                buf.clear();
                Err(FramingError::StreamClosed)
            }
        }
    }
}

impl<'a> Encoder<&'a Command> for LineCodec {
    type Error = FramingError;

    fn encode(&mut self, item: &'a Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_command(item, dst)
    }
}
