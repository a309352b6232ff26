use std::time::Duration;

use ehl_frame::Address;

/// Errors that can occur while exchanging commands with a dispenser.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ehl_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ehl_frame::FrameError),

    /// No frame arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The packet is addressed to a different dispenser than the channel.
    #[error("packet for address {packet} sent on channel for address {channel}")]
    AddressMismatch { channel: Address, packet: Address },
}

impl ChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
