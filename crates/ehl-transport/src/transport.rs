use bytes::Bytes;

use crate::error::{Result, TransportError};

/// A byte-level connection to one physical dispenser bus.
///
/// Implementations never assume frame boundaries: `read` hands back whatever
/// bytes the line has produced so far, and `write` may accept fewer bytes than
/// offered. Framing is the job of the layer above.
pub trait Transport: Send {
    /// Open the underlying line. Calling it on an open transport is a no-op.
    fn connect(&mut self) -> Result<()>;

    /// Close the underlying line. Subsequent reads and writes fail with
    /// [`TransportError::NotConnected`].
    fn disconnect(&mut self);

    /// Whether `connect` has succeeded and `disconnect` has not been called since.
    fn is_connected(&self) -> bool;

    /// Write some prefix of `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Read at most `max_bytes` without blocking. An empty result means
    /// nothing has arrived yet.
    fn read(&mut self, max_bytes: usize) -> Result<Bytes>;

    /// Push any buffered output onto the line.
    fn flush(&mut self) -> Result<()>;

    /// Transport name for diagnostics.
    fn name(&self) -> &str;

    /// Write all of `bytes`, retrying partial and interrupted writes, then flush.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.is_retryable() => continue,
                Err(err) => return Err(err),
            }
        }

        loop {
            match self.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Bytes> {
        (**self).read(max_bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
