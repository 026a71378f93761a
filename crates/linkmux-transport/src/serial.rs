//! Serial (USB/UART) link backend over the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use bytes::BytesMut;
use linkmux_frame::{Frame, SerialFraming, MAX_HEADERED_PAYLOAD};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connectable, FrameReader, FrameWriter};

/// Configuration for a serial link.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    /// Identifier header width in bytes; 0 means an anonymous channel.
    pub id_width: usize,
    pub terminator: u8,
    /// Read poll timeout. Also used as the write timeout.
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 115_200,
            id_width: 0,
            terminator: SerialFraming::DEFAULT_TERMINATOR,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_id_width(mut self, id_width: usize) -> Self {
        self.id_width = id_width;
        self
    }

    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A serial link carrying terminator-delimited frames.
pub struct SerialLink {
    config: SerialConfig,
    framing: SerialFraming,
    port: Option<Box<dyn serialport::SerialPort>>,
    rx: BytesMut,
    tx: BytesMut,
    written_since_clear: usize,
}

/// Bytes written between input-buffer housekeeping passes. A send-only port
/// still accumulates device echo and noise in the OS input buffer; it gets
/// discarded periodically instead of growing for the life of the process.
const HOUSEKEEPING_THRESHOLD: usize = 64;

impl SerialLink {
    pub fn new(config: SerialConfig) -> Result<Self> {
        let framing = SerialFraming::with_terminator(config.id_width, config.terminator)?;
        Ok(Self {
            config,
            framing,
            port: None,
            rx: BytesMut::new(),
            tx: BytesMut::new(),
            written_since_clear: 0,
        })
    }

    /// Bytes sitting in the receive buffer that do not yet form a frame.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }
}

impl Connectable for SerialLink {
    fn connect(&mut self) -> Result<()> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| TransportError::Connect {
                endpoint: self.config.port.clone(),
                source: e.into(),
            })?;
        self.port = Some(port);
        self.rx.clear();
        self.written_since_clear = 0;
        debug!(port = %self.config.port, baud = self.config.baud_rate, "serial port opened");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.config.port, "serial port closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.config.port
    }

    fn protocol(&self) -> &'static str {
        "serial"
    }
}

impl FrameWriter for SerialLink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.tx.clear();
        self.framing.encode(frame.id, &frame.payload, &mut self.tx)?;
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.write_all(&self.tx)?;
        port.flush()?;

        self.written_since_clear += self.tx.len();
        if self.written_since_clear > HOUSEKEEPING_THRESHOLD {
            port.clear(serialport::ClearBuffer::Input)
                .map_err(|e| TransportError::Io(e.into()))?;
            self.written_since_clear = 0;
        }
        Ok(())
    }

    fn max_payload(&self) -> Option<usize> {
        (self.framing.id_width() > 0).then_some(MAX_HEADERED_PAYLOAD)
    }
}

impl FrameReader for SerialLink {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.framing.decode(&mut self.rx)? {
                return Ok(Some(frame));
            }

            let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
            let mut chunk = [0u8; 256];
            match port.read(&mut chunk) {
                Ok(0) => {
                    return Err(TransportError::Io(std::io::Error::from(
                        std::io::ErrorKind::UnexpectedEof,
                    )))
                }
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    return Ok(None)
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
