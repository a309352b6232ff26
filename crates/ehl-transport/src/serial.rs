use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::Bytes;
use serialport::{FlowControl, SerialPort};
use tracing::{debug, info, trace};

pub use serialport::{DataBits, Parity, StopBits};

use crate::error::{Result, TransportError};
use crate::transport::Transport;

/// Default line speed for EHL dispensers.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial line settings.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub path: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Driver-level timeout applied to a single read or write call.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// 8N1 settings at the default baud rate for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// Serial port transport.
///
/// Reads never block: only bytes already queued by the driver are returned.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create an unopened transport. Call [`Transport::connect`] to open it.
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }

    /// Open the port immediately.
    pub fn open(config: SerialConfig) -> Result<Self> {
        let mut transport = Self::new(config);
        transport.connect()?;
        Ok(transport)
    }

    /// Current line settings.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(self.config.path.as_str(), self.config.baud_rate)
            .data_bits(self.config.data_bits)
            .parity(self.config.parity)
            .stop_bits(self.config.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: self.config.path.clone(),
                source,
            })?;

        info!(
            path = %self.config.path,
            baud = self.config.baud_rate,
            "opened serial port"
        );
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!(path = %self.config.path, "closed serial port");
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let port = self.port_mut()?;
        let n = port.write(bytes)?;
        trace!(bytes = ?&bytes[..n], "serial write");
        Ok(n)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Bytes> {
        let port = self.port_mut()?;
        let queued = port.bytes_to_read()? as usize;
        let want = queued.min(max_bytes);
        if want == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; want];
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(err) => return Err(err.into()),
        };
        buf.truncate(n);
        trace!(bytes = ?buf, "serial read");
        Ok(Bytes::from(buf))
    }

    fn flush(&mut self) -> Result<()> {
        self.port_mut()?.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.path
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.config.path)
            .field("baud_rate", &self.config.baud_rate)
            .field("connected", &self.port.is_some())
            .finish()
    }
}

/// Names of serial ports visible to the driver, sorted.
pub fn available_ports() -> Result<Vec<String>> {
    let mut names: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort();
    debug!(count = names.len(), "enumerated serial ports");
    Ok(names)
}
