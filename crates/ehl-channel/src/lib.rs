//! Request/response sequencing for EHL dispensers.
//!
//! The wire protocol carries no correlation id, so a response is simply the
//! next frame assembled after a request. That only works if nothing else is
//! in flight: a [`Bus`] owns the transport and the single frame assembler for
//! one physical line and admits one request at a time, in arrival order,
//! across every dispenser address. Each address is driven through its
//! [`CommandChannel`].

pub mod bus;
pub mod channel;
pub mod config;
pub mod error;
mod gate;

pub use bus::Bus;
pub use channel::{ChannelState, CommandChannel};
pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
