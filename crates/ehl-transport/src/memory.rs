use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::transport::Transport;

#[derive(Debug, Default)]
struct Pipe {
    bytes: VecDeque<u8>,
    closed: bool,
}

type SharedPipe = Arc<Mutex<Pipe>>;

fn lock(pipe: &SharedPipe) -> MutexGuard<'_, Pipe> {
    pipe.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One end of an in-process full-duplex byte pipe.
///
/// Bytes written on one end become readable on the other. Dropping an end
/// closes both directions; the surviving end sees [`TransportError::Closed`]
/// on write, and on read once it has drained what was already written.
pub struct MemoryTransport {
    name: String,
    rx: SharedPipe,
    tx: SharedPipe,
    connected: bool,
}

impl MemoryTransport {
    /// Create a connected pair of ends, `(host, device)`.
    pub fn pair() -> (Self, Self) {
        let host_to_device = SharedPipe::default();
        let device_to_host = SharedPipe::default();

        let host = Self {
            name: "memory-host".to_string(),
            rx: Arc::clone(&device_to_host),
            tx: Arc::clone(&host_to_device),
            connected: true,
        };
        let device = Self {
            name: "memory-device".to_string(),
            rx: host_to_device,
            tx: device_to_host,
            connected: true,
        };
        (host, device)
    }

    /// Rename this end for diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bytes written by the other end and not yet read here.
    pub fn pending(&self) -> usize {
        lock(&self.rx).bytes.len()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> Result<()> {
        if lock(&self.tx).closed {
            return Err(TransportError::Closed);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            debug!(name = %self.name, "memory transport disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.ensure_connected()?;
        let mut pipe = lock(&self.tx);
        if pipe.closed {
            return Err(TransportError::Closed);
        }
        pipe.bytes.extend(bytes.iter().copied());
        trace!(name = %self.name, bytes = ?bytes, "memory write");
        Ok(bytes.len())
    }

    fn read(&mut self, max_bytes: usize) -> Result<Bytes> {
        self.ensure_connected()?;
        let mut pipe = lock(&self.rx);
        if pipe.bytes.is_empty() && pipe.closed {
            return Err(TransportError::Closed);
        }
        let n = pipe.bytes.len().min(max_bytes);
        let out: Vec<u8> = pipe.bytes.drain(..n).collect();
        Ok(Bytes::from(out))
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_connected()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        lock(&self.tx).closed = true;
        lock(&self.rx).closed = true;
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .field("connected", &self.connected)
            .finish()
    }
}
