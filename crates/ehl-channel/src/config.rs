use std::time::Duration;

use ehl_frame::AssemblerConfig;

/// Timing and buffering for a bus and its channels.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Deadline used by [`crate::CommandChannel::request`].
    pub response_timeout: Duration,
    /// Sleep between non-blocking reads while waiting for a response.
    pub poll_interval: Duration,
    /// After a request times out, the next request on the bus waits until this
    /// long past the deadline and discards whatever arrived first. A reply
    /// later than this is matched to the next request instead.
    pub settle_after_timeout: Duration,
    /// Maximum bytes requested from the transport per read.
    pub read_chunk: usize,
    /// Frame assembler settings.
    pub assembler: AssemblerConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(5),
            settle_after_timeout: Duration::from_millis(100),
            read_chunk: 256,
            assembler: AssemblerConfig::default(),
        }
    }
}
