/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// Serial driver error outside of open (e.g. querying queued bytes).
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the line.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation requires `connect` to have succeeded first.
    #[error("transport not connected")]
    NotConnected,

    /// The far end of the line has gone away.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// True for I/O errors that only mean "try again".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::Interrupted
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
