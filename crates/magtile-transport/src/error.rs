/// Errors that can occur while opening or driving a serial transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No serial device path was configured.
    #[error("no serial device selected")]
    NoDeviceSelected,

    /// The OS refused access to the device node.
    #[error("permission denied opening {path}")]
    PermissionDenied { path: String },

    /// The port exists but could not be opened with the requested settings.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// Listing the available serial ports failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// An I/O error occurred on the open stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handle has already been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
