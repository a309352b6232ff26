//! `tokio_util::codec` adapter for EHL frames.
//!
//! Wraps the same resynchronizing decode loop as [`crate::FrameAssembler`],
//! for callers that drive the serial line through `FramedRead`/`FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::assembler::{assemble, enforce_cap, AssemblerConfig, AssemblerStats};
use crate::codec::{encode_into, Packet, MAX_FRAME_LEN};
use crate::error::FrameError;

/// Codec yielding [`Packet`]s from a byte stream and encoding them back.
#[derive(Debug, Clone, Default)]
pub struct EhlCodec {
    config: AssemblerConfig,
    stats: AssemblerStats,
}

impl EhlCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AssemblerConfig) -> Self {
        Self {
            config,
            stats: AssemblerStats::default(),
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }
}

impl Decoder for EhlCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        if let Some(packet) = assemble(src, &mut self.stats) {
            return Ok(Some(packet));
        }
        let max = self.config.max_buffer.max(MAX_FRAME_LEN);
        self.stats.overflow_bytes += enforce_cap(src, max) as u64;
        Ok(None)
    }
}

impl Encoder<Packet> for EhlCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(&item, dst);
        Ok(())
    }
}

impl Encoder<&Packet> for EhlCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Address, STX};
    use crate::command::CommandCode;

    #[test]
    fn decode_across_partial_buffers() {
        let mut codec = EhlCodec::new();
        let packet = Packet::command(Address::new(1).unwrap(), CommandCode::State);

        let mut wire = BytesMut::new();
        codec.encode(&packet, &mut wire).unwrap();

        let mut src = BytesMut::from(&wire[..3]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&wire[3..]);
        assert_eq!(codec.decode(&mut src).unwrap(), Some(packet));
        assert!(src.is_empty());
    }

    #[test]
    fn decode_resyncs_over_garbage() {
        let mut codec = EhlCodec::new();
        let packet = Packet::command(Address::new(12).unwrap(), CommandCode::LineTest);

        let mut src = BytesMut::from(&[0xFF, 0x00, STX][..]);
        codec.encode(packet.clone(), &mut src).unwrap();
        src.extend_from_slice(&[0u8; 40]);

        assert_eq!(codec.decode(&mut src).unwrap(), Some(packet));
        assert_eq!(codec.stats().frames, 1);
        assert!(codec.stats().resync_bytes >= 3);
    }

    #[test]
    fn backlog_larger_than_cap_yields_every_frame() {
        let mut codec = EhlCodec::new();
        let mut src = BytesMut::new();
        for raw in 1..=200u8 {
            let packet = Packet::command(Address::new(raw).unwrap(), CommandCode::State);
            codec.encode(packet, &mut src).unwrap();
        }
        assert!(src.len() > crate::DEFAULT_MAX_BUFFER);

        let mut seen = 0u8;
        while let Some(packet) = codec.decode(&mut src).unwrap() {
            seen += 1;
            assert_eq!(packet.address().get(), seen);
        }
        assert_eq!(seen, 200);
        assert_eq!(codec.stats().overflow_bytes, 0);
    }
}
