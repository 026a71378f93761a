//! SPI link backend over Linux spidev.
//!
//! SPI is host-clocked and full duplex: every write also reads, and every
//! read must clock fill bytes out. With a length header configured, a read
//! is a two-phase poll (header first, then exactly the declared body);
//! otherwise each poll exchanges a fixed-size packet. There is no "no data"
//! condition, so `read_frame` never returns `Ok(None)` here.

use bytes::BytesMut;
use linkmux_frame::{Frame, SpiFraming};
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connectable, FrameReader, FrameWriter};

/// Configuration for an SPI link.
#[derive(Debug, Clone)]
pub struct SpiConfig {
    /// SPI bus number; the device node is `/dev/spidev<bus>.<device>`.
    pub bus: u8,
    /// Chip-select number on the bus.
    pub device: u8,
    /// SPI mode 0-3 (clock polarity/phase).
    pub mode: u8,
    pub max_speed_hz: u32,
    /// Length header width in bytes; 0 disables the two-phase read.
    pub len_width: usize,
    /// Identifier header width in bytes; 0 means an anonymous channel.
    pub id_width: usize,
    /// Fixed packet size for headerless polls.
    pub packet_size: usize,
}

impl SpiConfig {
    pub fn new(bus: u8, device: u8) -> Self {
        Self {
            bus,
            device,
            mode: 0,
            max_speed_hz: 500_000,
            len_width: 0,
            id_width: 0,
            packet_size: SpiFraming::DEFAULT_PACKET_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_speed_hz(mut self, max_speed_hz: u32) -> Self {
        self.max_speed_hz = max_speed_hz;
        self
    }

    pub fn with_headers(mut self, len_width: usize, id_width: usize) -> Self {
        self.len_width = len_width;
        self.id_width = id_width;
        self
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Device node path for this bus/chip-select pair.
    pub fn device_path(&self) -> String {
        format!("/dev/spidev{}.{}", self.bus, self.device)
    }
}

/// An SPI link bound to one bus/chip-select pair.
#[derive(Debug)]
pub struct SpiLink {
    config: SpiConfig,
    endpoint: String,
    framing: SpiFraming,
    dev: Option<Spidev>,
    tx: BytesMut,
}

impl SpiLink {
    pub fn new(config: SpiConfig) -> Result<Self> {
        if config.mode > 3 {
            return Err(TransportError::InvalidConfig(format!(
                "SPI mode {} out of range 0-3",
                config.mode
            )));
        }
        let framing = SpiFraming::new(config.len_width, config.id_width, config.packet_size)?;
        let endpoint = format!("{}.{}", config.bus, config.device);
        Ok(Self {
            config,
            endpoint,
            framing,
            dev: None,
            tx: BytesMut::new(),
        })
    }

    fn mode_flags(&self) -> SpiModeFlags {
        match self.config.mode {
            1 => SpiModeFlags::SPI_MODE_1,
            2 => SpiModeFlags::SPI_MODE_2,
            3 => SpiModeFlags::SPI_MODE_3,
            _ => SpiModeFlags::SPI_MODE_0,
        }
    }

    /// Clock `tx` out while capturing the same number of inbound bytes.
    fn exchange(dev: &mut Spidev, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0u8; tx.len()];
        let mut transfer = SpidevTransfer::read_write(tx, &mut rx);
        dev.transfer(&mut transfer)?;
        Ok(rx)
    }
}

impl Connectable for SpiLink {
    fn connect(&mut self) -> Result<()> {
        let path = self.config.device_path();
        let mut dev = Spidev::open(&path).map_err(|e| TransportError::Connect {
            endpoint: self.endpoint.clone(),
            source: e,
        })?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(self.config.max_speed_hz)
            .mode(self.mode_flags())
            .build();
        dev.configure(&options)?;
        debug!(
            device = %path,
            speed_hz = self.config.max_speed_hz,
            mode = self.config.mode,
            "SPI device opened"
        );
        self.dev = Some(dev);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.dev.take().is_some() {
            debug!(device = %self.config.device_path(), "SPI device closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.dev.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn protocol(&self) -> &'static str {
        "spi"
    }
}

impl FrameWriter for SpiLink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.tx.clear();
        self.framing.encode(frame.id, &frame.payload, &mut self.tx)?;
        let dev = self.dev.as_mut().ok_or(TransportError::NotConnected)?;
        Self::exchange(dev, &self.tx)?;
        Ok(())
    }
}

impl FrameReader for SpiLink {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let dev = self.dev.as_mut().ok_or(TransportError::NotConnected)?;

        if self.framing.len_width() > 0 {
            // Two-phase poll: clock out the length header, then exactly the
            // identifier and declared body.
            let header = Self::exchange(dev, &vec![0u8; self.framing.len_width()])?;
            let len = self.framing.parse_len(&header)?;
            let body = Self::exchange(dev, &vec![0u8; self.framing.id_width() + len])?;

            let mut packet = header;
            packet.extend_from_slice(&body);
            return Ok(Some(self.framing.decode_packet(&packet)?));
        }

        let packet = Self::exchange(dev, &vec![0u8; self.framing.packet_size()])?;
        Ok(Some(self.framing.decode_packet(&packet)?))
    }
}
