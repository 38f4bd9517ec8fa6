//! Line framing and command/response encoding for the MagTile protocol.
//!
//! The device speaks newline-terminated ASCII in both directions:
//! - Requests are `<verb> <arg> <arg>...\n`
//! - Replies are `ok : <payload>`, `error`, or anything else (a protocol error)
//!
//! [`LineFramer`] turns arbitrary read chunks into whole lines; bytes after a
//! newline are kept for the next line. With the `async` feature,
//! [`LineCodec`] provides the same framing for `tokio_util::codec::Framed`.

pub mod codec;
pub mod command;
pub mod device;
pub mod error;
pub mod framer;
#[cfg(feature = "async")]
pub mod line_codec;
pub mod response;
pub mod verbs;

pub use codec::{
    decode_line, encode_command, LineConfig, LineDecoder, DEFAULT_MAX_LINE_LENGTH, NEWLINE,
};
pub use command::Command;
pub use device::DeviceCommand;
pub use error::{FramingError, Result};
pub use framer::LineFramer;
#[cfg(feature = "async")]
pub use line_codec::LineCodec;
pub use response::{Response, ERROR_REPLY, SUCCESS_PREFIX};
