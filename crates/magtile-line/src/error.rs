/// Errors that can occur while framing lines or encoding commands.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The stream ended before a newline was seen. Buffered bytes are dropped.
    #[error("stream closed before a complete line was received")]
    StreamClosed,

    /// The device sent more bytes than allowed without a newline.
    #[error("line too long ({len} bytes, max {max})")]
    LineTooLong { len: usize, max: usize },

    /// A command token was empty or contained whitespace.
    #[error("invalid command token {0:?}")]
    InvalidToken(String),

    /// An I/O error occurred while pulling bytes from the transport.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FramingError>;
