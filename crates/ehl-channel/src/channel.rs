use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use ehl_frame::{encode, Address, CommandCode, Packet};
use ehl_transport::Transport;
use tracing::{debug, warn};

use crate::bus::{Bus, Line};
use crate::error::{ChannelError, Result};

/// Where a channel is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No request outstanding.
    #[default]
    Idle,
    /// Request bytes are being written.
    Sending,
    /// Request written, waiting for the next frame.
    Waiting,
}

/// Per-address state shared by every handle to the same channel.
#[derive(Debug, Default)]
pub(crate) struct ChannelSlot {
    state: Mutex<ChannelState>,
}

impl ChannelSlot {
    fn get(&self) -> ChannelState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: ChannelState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Returns the slot to `Idle` however the request ends.
struct IdleOnDrop<'a>(&'a ChannelSlot);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(ChannelState::Idle);
    }
}

/// Sends commands to one dispenser address and waits for the reply.
///
/// Handles are cheap to clone. Concurrent callers, on this address or any
/// other on the same [`Bus`], queue in arrival order; the bytes of two
/// requests never interleave on the wire.
pub struct CommandChannel<T> {
    address: Address,
    bus: Arc<Bus<T>>,
    slot: Arc<ChannelSlot>,
}

impl<T> Clone for CommandChannel<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            bus: Arc::clone(&self.bus),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Transport> CommandChannel<T> {
    pub(crate) fn new(address: Address, bus: Arc<Bus<T>>, slot: Arc<ChannelSlot>) -> Self {
        Self { address, bus, slot }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> ChannelState {
        self.slot.get()
    }

    pub fn bus(&self) -> &Arc<Bus<T>> {
        &self.bus
    }

    /// Whether two handles drive the same address slot.
    pub fn shares_state_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Send `command` with `data` using the bus's default response timeout.
    pub fn request(&self, command: CommandCode, data: impl Into<Bytes>) -> Result<Packet> {
        let packet = Packet::new(self.address, command, data)?;
        self.send_and_await(&packet, self.bus.config().response_timeout)
    }

    /// Send a command that carries no data.
    pub fn query(&self, command: CommandCode) -> Result<Packet> {
        let packet = Packet::command(self.address, command);
        self.send_and_await(&packet, self.bus.config().response_timeout)
    }

    /// Write `packet` and return the next frame assembled from the line.
    ///
    /// Blocks until earlier requests on the bus have finished. On timeout the
    /// request is abandoned locally; its reply, if it ever arrives, is
    /// discarded before the next request goes out.
    ///
    /// The frame format carries no correlation id. A late reply is only
    /// recognized as stale if it is fully assembled before the next request
    /// is written, which the bus waits up to
    /// [`ChannelConfig::settle_after_timeout`](crate::ChannelConfig) for. A
    /// reply slower than that is returned to whichever request comes next.
    pub fn send_and_await(&self, packet: &Packet, timeout: Duration) -> Result<Packet> {
        if packet.address() != self.address {
            return Err(ChannelError::AddressMismatch {
                channel: self.address,
                packet: packet.address(),
            });
        }

        let (_turn, mut line) = self.bus.begin();
        self.bus.discard_stale(&mut line)?;

        let _idle = IdleOnDrop(&self.slot);
        self.slot.set(ChannelState::Sending);
        let wire = encode(packet);
        debug!(
            address = %self.address,
            command = %packet.command_code(),
            len = wire.len(),
            "sending request"
        );
        line.transport.write_all(&wire)?;

        self.slot.set(ChannelState::Waiting);
        self.await_response(&mut line, packet, timeout)
    }

    fn await_response(
        &self,
        line: &mut Line<T>,
        request: &Packet,
        timeout: Duration,
    ) -> Result<Packet> {
        let config = self.bus.config();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(response) = line.assembler.next_packet() {
                if response.address() != self.address {
                    warn!(
                        expected = %self.address,
                        actual = %response.address(),
                        command = %response.command_code(),
                        "response from unexpected address"
                    );
                }
                debug!(
                    address = %self.address,
                    request = %request.command_code(),
                    response = %response.command_code(),
                    "received response"
                );
                return Ok(response);
            }

            if line.fill(config.read_chunk)? > 0 {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    address = %self.address,
                    command = %request.command_code(),
                    ?timeout,
                    "request timed out"
                );
                line.settle_until = Some(now + config.settle_after_timeout);
                return Err(ChannelError::Timeout(timeout));
            }
            thread::sleep(config.poll_interval.min(deadline - now));
        }
    }
}

impl<T> std::fmt::Debug for CommandChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("address", &self.address)
            .field("bus", &self.bus.name())
            .field("state", &self.slot.get())
            .finish()
    }
}
