use magtile_line::FramingError;
use magtile_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Line framing or encoding error.
    #[error("{0}")]
    Framing(#[from] FramingError),

    /// A command was issued without an open connection.
    #[error("not connected to device")]
    NotConnected,

    /// `connect` was called on a session that is already connected.
    #[error("already connected to device")]
    AlreadyConnected,
}

impl SessionError {
    /// Whether the link can no longer be trusted after this error.
    ///
    /// A closed stream or a failed read/write ends the connection. An
    /// over-long line or an invalid token leaves it usable.
    pub fn is_link_fatal(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Framing(FramingError::StreamClosed | FramingError::Io(_)) => true,
            SessionError::Framing(_) => false,
            SessionError::NotConnected | SessionError::AlreadyConnected => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
