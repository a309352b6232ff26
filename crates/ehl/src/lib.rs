//! Control LPG fuel dispensers over the EHL serial protocol.
//!
//! EHL is a compact binary command/response protocol spoken on a shared,
//! half-duplex, multi-drop serial bus. This crate gathers the layers:
//!
//! - [`transport`]: the byte pipe (`SerialTransport`, `MemoryTransport`)
//! - [`frame`]: packet codec and resynchronizing frame assembler
//! - [`channel`]: bus arbitration and request/response sequencing (behind `channel`)
//! - [`transaction`]: delivery lifecycle per dispenser (behind `transaction`)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ehl::channel::Bus;
//! use ehl::frame::{Address, CommandCode};
//! use ehl::transport::{SerialConfig, SerialTransport};
//!
//! let transport = SerialTransport::open(SerialConfig::new("/dev/ttyUSB0"))?;
//! let bus = Arc::new(Bus::new(transport));
//! let pump = bus.channel(Address::new(1)?);
//! let state = pump.query(CommandCode::State)?;
//! println!("{state}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use ehl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ehl_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use ehl_channel::*;
}

/// Re-export transaction types (requires `transaction` feature).
#[cfg(feature = "transaction")]
pub mod transaction {
    pub use ehl_transaction::*;
}
