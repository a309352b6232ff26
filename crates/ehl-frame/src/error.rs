/// Errors raised when building packets or driving the async codec.
///
/// Corrupt bytes on the wire are not errors at this level: [`crate::decode`]
/// reports them through [`crate::ParseResult`] and the assembler recovers
/// from them on its own.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Dispenser addresses run from 1 to 255.
    #[error("invalid dispenser address {0} (expected 1..=255)")]
    InvalidAddress(u8),

    /// The payload does not fit in a single frame.
    #[error("payload too large ({len} bytes, max {max})")]
    DataTooLong { len: usize, max: usize },

    /// An I/O error from the stream driving the codec.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
