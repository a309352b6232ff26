//! Byte transport abstraction for EHL dispenser buses.
//!
//! The transport is the lowest layer: it moves raw bytes on and off a
//! half-duplex multi-drop line and knows nothing about frames. Reads are
//! non-blocking and may return any number of bytes, including none.
//!
//! - [`SerialTransport`] drives a real serial port (RS-485 adapter).
//! - [`MemoryTransport`] is an in-process pipe pair used by tests and
//!   software dispenser emulators.

pub mod error;
pub mod memory;
pub mod serial;
pub mod transport;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use serial::{
    available_ports, DataBits, Parity, SerialConfig, SerialTransport, StopBits, DEFAULT_BAUD_RATE,
};
pub use transport::Transport;
