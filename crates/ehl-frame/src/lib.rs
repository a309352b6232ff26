//! EHL packet codec and stream framing.
//!
//! Every packet on the wire is framed as:
//!
//! ```text
//! ┌──────┬────────┬─────────┬─────────┬──────────┬──────────┬──────┐
//! │ STX  │ Length │ Address │ Command │ Data     │ Checksum │ ETX  │
//! │ 0x20 │ (1B)   │ (1B)    │ (1B)    │ (0..249) │ (1B XOR) │ 0x36 │
//! └──────┴────────┴─────────┴─────────┴──────────┴──────────┴──────┘
//! ```
//!
//! `Length` counts the whole frame, markers included. The checksum is the XOR
//! of every byte from STX through the last data byte.
//!
//! [`decode`] inspects one frame at the front of a byte slice;
//! [`FrameAssembler`] turns an arbitrarily chunked and possibly corrupted byte
//! stream into whole packets, dropping one byte at a time to resynchronize.

pub mod assembler;
pub mod codec;
pub mod command;
pub mod error;
#[cfg(feature = "async")]
pub mod tokio_codec;

pub use assembler::{AssemblerConfig, AssemblerStats, FrameAssembler, DEFAULT_MAX_BUFFER};
pub use codec::{
    checksum, decode, encode, encode_into, Address, FormatError, Packet, ParseResult, ETX,
    MAX_DATA_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN, STX,
};
pub use command::CommandCode;
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use tokio_codec::EhlCodec;
