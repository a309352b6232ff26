use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use ehl_frame::{Address, AssemblerStats, FrameAssembler, Packet};
use ehl_transport::Transport;
use tracing::{debug, warn};

use crate::channel::{ChannelSlot, CommandChannel};
use crate::config::ChannelConfig;
use crate::error::Result;
use crate::gate::{TicketGate, Turn};

/// Upper bound on back-to-back reads when draining whatever the line holds.
const MAX_DRAIN_READS: usize = 16;

/// The transport and assembler for one physical line.
pub(crate) struct Line<T> {
    pub(crate) transport: T,
    pub(crate) assembler: FrameAssembler,
    /// Set when a request times out; the next request waits for it.
    pub(crate) settle_until: Option<Instant>,
}

impl<T: Transport> Line<T> {
    /// One non-blocking read into the assembler. Returns bytes added.
    pub(crate) fn fill(&mut self, read_chunk: usize) -> Result<usize> {
        match self.transport.read(read_chunk) {
            Ok(chunk) => {
                self.assembler.push(&chunk);
                Ok(chunk.len())
            }
            Err(err) if err.is_retryable() => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Read until the transport has nothing more queued.
    fn fill_all(&mut self, read_chunk: usize) -> Result<usize> {
        let mut total = 0;
        for _ in 0..MAX_DRAIN_READS {
            let n = self.fill(read_chunk)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

/// One physical dispenser bus.
///
/// Owns the transport and the single frame assembler reading it, and admits
/// exactly one request at a time in FIFO order regardless of which dispenser
/// it is addressed to. Share it behind an [`Arc`] and hand out one
/// [`CommandChannel`] per address with [`Bus::channel`].
pub struct Bus<T> {
    name: String,
    config: ChannelConfig,
    gate: TicketGate,
    line: Mutex<Line<T>>,
    slots: Mutex<HashMap<Address, Arc<ChannelSlot>>>,
}

impl<T> Bus<T> {
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Transport name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Transport> Bus<T> {
    /// Wrap a transport with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Wrap a transport with explicit configuration.
    pub fn with_config(transport: T, config: ChannelConfig) -> Self {
        let line = Line {
            assembler: FrameAssembler::with_config(config.assembler.clone()),
            transport,
            settle_until: None,
        };
        Self {
            name: line.transport.name().to_string(),
            config,
            gate: TicketGate::default(),
            line: Mutex::new(line),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The channel for `address`. Every call for the same address shares
    /// one channel state.
    pub fn channel(self: &Arc<Self>, address: Address) -> CommandChannel<T> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(address).or_insert_with(|| {
                debug!(bus = %self.name, %address, "opening channel");
                Arc::default()
            }))
        };
        CommandChannel::new(address, Arc::clone(self), slot)
    }

    /// Addresses that have had a channel opened, ascending.
    pub fn addresses(&self) -> Vec<Address> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut addresses: Vec<Address> = slots.keys().copied().collect();
        addresses.sort();
        addresses
    }

    /// Open the transport.
    pub fn connect(&self) -> Result<()> {
        let (_turn, mut line) = self.begin();
        line.transport.connect()?;
        Ok(())
    }

    /// Close the transport. Bytes already assembled are kept.
    pub fn disconnect(&self) {
        let (_turn, mut line) = self.begin();
        line.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.lock_line().transport.is_connected()
    }

    /// Collect frames that arrived without a request outstanding.
    ///
    /// Waits its turn like a request, so it never steals a response.
    pub fn poll(&self) -> Result<Vec<Packet>> {
        let (_turn, mut line) = self.begin();
        line.fill_all(self.config.read_chunk)?;
        Ok(line.assembler.drain())
    }

    /// Assembler counters for this line.
    pub fn stats(&self) -> AssemblerStats {
        self.lock_line().assembler.stats()
    }

    /// Wait for this caller's turn and take the line.
    pub(crate) fn begin(&self) -> (Turn<'_>, MutexGuard<'_, Line<T>>) {
        let turn = self.gate.enter();
        (turn, self.lock_line())
    }

    /// Throw away frames that completed while nobody was waiting, such as a
    /// response that arrived after its request timed out.
    ///
    /// Following a timeout this first waits out the settle window so a reply
    /// still in flight lands here rather than in the next request.
    pub(crate) fn discard_stale(&self, line: &mut Line<T>) -> Result<()> {
        if let Some(until) = line.settle_until.take() {
            let now = Instant::now();
            if until > now {
                debug!(bus = %self.name, wait = ?(until - now), "settling after timeout");
                thread::sleep(until - now);
            }
        }
        line.fill_all(self.config.read_chunk)?;
        for packet in line.assembler.drain() {
            warn!(bus = %self.name, %packet, "discarding unmatched frame");
        }
        Ok(())
    }

    /// Requests holding or queued for the line.
    pub fn queued(&self) -> u64 {
        self.gate.occupancy()
    }

    fn lock_line(&self) -> MutexGuard<'_, Line<T>> {
        self.line.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
