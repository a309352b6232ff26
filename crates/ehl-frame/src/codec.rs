use std::fmt;
use std::num::NonZeroU8;

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::CommandCode;
use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const STX: u8 = 0x20;

/// End-of-frame marker.
pub const ETX: u8 = 0x36;

/// Smallest possible frame: STX, length, address, command, checksum, ETX.
pub const MIN_FRAME_LEN: usize = 6;

/// The length field is one byte, so no frame can be longer than this.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Largest payload that fits in one frame.
pub const MAX_DATA_LEN: usize = MAX_FRAME_LEN - MIN_FRAME_LEN;

/// A dispenser address on the bus, 1 through 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct Address(NonZeroU8);

impl Address {
    /// Validate a raw address byte.
    pub fn new(raw: u8) -> Result<Self> {
        NonZeroU8::new(raw)
            .map(Self)
            .ok_or(FrameError::InvalidAddress(raw))
    }

    /// The address as it appears on the wire.
    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u8> for Address {
    type Error = FrameError;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.get()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// One EHL packet.
///
/// Fields are private so that every `Packet` in existence satisfies the frame
/// invariants; construct with [`Packet::new`] or [`Packet::command`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    address: Address,
    command: CommandCode,
    data: Bytes,
}

impl Packet {
    /// Build a packet, rejecting payloads that do not fit in one frame.
    ///
    /// `CommandCode::Unknown` wrapping a known wire byte is normalized to
    /// the named code, the same value decoding would produce.
    pub fn new(address: Address, command: CommandCode, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::DataTooLong {
                len: data.len(),
                max: MAX_DATA_LEN,
            });
        }
        Ok(Self {
            address,
            command: CommandCode::from_code(command.code()),
            data,
        })
    }

    /// Build a packet with no payload.
    pub fn command(address: Address, command: CommandCode) -> Self {
        Self {
            address,
            command: CommandCode::from_code(command.code()),
            data: Bytes::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn command_code(&self) -> CommandCode {
        self.command
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Total bytes on the wire, markers included.
    pub fn frame_len(&self) -> usize {
        MIN_FRAME_LEN + self.data.len()
    }

    /// The checksum byte this packet is sent with.
    pub fn checksum(&self) -> u8 {
        let head = [
            STX,
            self.frame_len() as u8,
            self.address.get(),
            self.command.code(),
        ];
        checksum(&head) ^ checksum(&self.data)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.command, self.address)?;
        if !self.data.is_empty() {
            write!(f, " [")?;
            for (i, byte) in self.data.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{byte:02X}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Why a frame at the front of a buffer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The first byte is not STX.
    BadStx,
    /// The length byte is smaller than the minimum frame.
    BadLength(u8),
    /// The byte at `length - 1` is not ETX.
    BadEtx,
    /// Address 0 is not a dispenser.
    BadAddress,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::BadStx => f.write_str("bad STX"),
            FormatError::BadLength(len) => write!(f, "bad length {len}"),
            FormatError::BadEtx => f.write_str("bad ETX"),
            FormatError::BadAddress => f.write_str("bad address"),
        }
    }
}

/// Outcome of decoding the frame at the front of a byte slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A whole, valid frame.
    Success(Packet),
    /// The frame is well-formed but its checksum byte is wrong.
    ChecksumError { expected: u8, actual: u8 },
    /// The bytes cannot be the start of a frame.
    InvalidFormat(FormatError),
    /// More bytes are needed before anything can be decided.
    Incomplete,
}

/// XOR of every byte in `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Encode a packet into its exact wire bytes.
pub fn encode(packet: &Packet) -> Bytes {
    let mut dst = BytesMut::with_capacity(packet.frame_len());
    encode_into(packet, &mut dst);
    dst.freeze()
}

/// Append a packet's wire bytes to `dst`.
pub fn encode_into(packet: &Packet, dst: &mut BytesMut) {
    dst.reserve(packet.frame_len());
    dst.put_u8(STX);
    dst.put_u8(packet.frame_len() as u8);
    dst.put_u8(packet.address.get());
    dst.put_u8(packet.command.code());
    dst.put_slice(&packet.data);
    dst.put_u8(packet.checksum());
    dst.put_u8(ETX);
}

/// Decode the frame at the front of `bytes`.
///
/// Only `bytes[..length]` is ever examined, where `length` is the frame's own
/// length byte; whatever follows belongs to the caller.
pub fn decode(bytes: &[u8]) -> ParseResult {
    if bytes.len() < MIN_FRAME_LEN {
        return ParseResult::Incomplete;
    }
    if bytes[0] != STX {
        return ParseResult::InvalidFormat(FormatError::BadStx);
    }

    let length = bytes[1] as usize;
    if length < MIN_FRAME_LEN {
        return ParseResult::InvalidFormat(FormatError::BadLength(bytes[1]));
    }
    if bytes.len() < length {
        return ParseResult::Incomplete;
    }
    if bytes[length - 1] != ETX {
        return ParseResult::InvalidFormat(FormatError::BadEtx);
    }

    let expected = checksum(&bytes[..length - 2]);
    let actual = bytes[length - 2];
    if expected != actual {
        return ParseResult::ChecksumError { expected, actual };
    }

    let Ok(address) = Address::new(bytes[2]) else {
        return ParseResult::InvalidFormat(FormatError::BadAddress);
    };

    ParseResult::Success(Packet {
        address,
        command: CommandCode::from_code(bytes[3]),
        data: Bytes::copy_from_slice(&bytes[4..length - 2]),
    })
}
