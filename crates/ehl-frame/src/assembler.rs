use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode, FormatError, Packet, ParseResult, MAX_FRAME_LEN};

/// Default cap on bytes held while waiting for a frame boundary.
pub const DEFAULT_MAX_BUFFER: usize = 1024;

/// Configuration for the frame assembler.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Undecoded bytes kept before the oldest are discarded. Only bytes left
    /// over after every complete frame has been taken out count against it.
    /// Values below one maximum frame are raised to [`MAX_FRAME_LEN`] so a
    /// valid frame always fits.
    pub max_buffer: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

impl AssemblerConfig {
    fn effective_max_buffer(&self) -> usize {
        self.max_buffer.max(MAX_FRAME_LEN)
    }
}

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Packets yielded.
    pub frames: u64,
    /// Bytes dropped one at a time while resynchronizing.
    pub resync_bytes: u64,
    /// Resync steps triggered by a checksum mismatch.
    pub checksum_errors: u64,
    /// Resync steps triggered by a malformed frame start.
    pub format_errors: u64,
    /// Bytes discarded because the buffer cap was exceeded.
    pub overflow_bytes: u64,
}

/// Extracts whole packets from an arbitrarily chunked byte stream.
///
/// Feed bytes with [`push`](Self::push) as they come off the line and pull
/// packets with [`next_packet`](Self::next_packet). Corrupt input is skipped
/// one byte at a time until a valid frame boundary lines up again. The
/// assembler does no I/O of its own.
///
/// Frames are decoded as soon as their bytes are pushed, so however the
/// stream is chunked the same packets come out.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    ready: VecDeque<Packet>,
    config: AssemblerConfig,
    stats: AssemblerStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(AssemblerConfig::default())
    }

    /// Create an assembler with explicit configuration.
    pub fn with_config(config: AssemblerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.effective_max_buffer()),
            ready: VecDeque::new(),
            config,
            stats: AssemblerStats::default(),
        }
    }

    /// Append bytes read from the transport and decode every frame they
    /// complete. The buffer cap applies to what is left undecoded.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        while let Some(packet) = assemble(&mut self.buf, &mut self.stats) {
            self.ready.push_back(packet);
        }
        let dropped = enforce_cap(&mut self.buf, self.config.effective_max_buffer());
        self.stats.overflow_bytes += dropped as u64;
    }

    /// Yield the next complete packet, or `None` until more bytes arrive.
    pub fn next_packet(&mut self) -> Option<Packet> {
        self.ready.pop_front()
    }

    /// Yield every complete packet currently buffered.
    pub fn drain(&mut self) -> Vec<Packet> {
        std::iter::from_fn(|| self.next_packet()).collect()
    }

    /// Bytes held waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Packets decoded and not yet taken.
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    /// Discard undecoded bytes and untaken packets. Counters are kept.
    pub fn clear(&mut self) {
        if !self.buf.is_empty() || !self.ready.is_empty() {
            debug!(
                dropped_bytes = self.buf.len(),
                dropped_frames = self.ready.len(),
                "clearing assembler buffer"
            );
            self.buf.clear();
            self.ready.clear();
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }
}

/// Keep only the newest `max` bytes. Returns how many were dropped.
pub(crate) fn enforce_cap(buf: &mut BytesMut, max: usize) -> usize {
    if buf.len() <= max {
        return 0;
    }
    let excess = buf.len() - max;
    buf.advance(excess);
    warn!(dropped = excess, kept = max, "assembler buffer over cap, dropped oldest bytes");
    excess
}

/// Decode from the front of `buf`, dropping one byte per framing failure.
///
/// Every iteration either returns or shortens `buf` by one byte, so the loop
/// is bounded by the buffer length.
pub(crate) fn assemble(buf: &mut BytesMut, stats: &mut AssemblerStats) -> Option<Packet> {
    loop {
        match decode(&buf[..]) {
            ParseResult::Success(packet) => {
                buf.advance(packet.frame_len());
                stats.frames += 1;
                trace!(%packet, "assembled frame");
                return Some(packet);
            }
            ParseResult::Incomplete => return None,
            ParseResult::ChecksumError { expected, actual } => {
                stats.checksum_errors += 1;
                debug!(
                    expected = format_args!("{expected:#04x}"),
                    actual = format_args!("{actual:#04x}"),
                    "checksum mismatch, resyncing"
                );
            }
            ParseResult::InvalidFormat(FormatError::BadStx) => {
                stats.format_errors += 1;
                trace!(byte = buf[0], "skipping byte outside frame");
            }
            ParseResult::InvalidFormat(reason) => {
                stats.format_errors += 1;
                debug!(%reason, "malformed frame, resyncing");
            }
        }
        buf.advance(1);
        stats.resync_bytes += 1;
    }
}
