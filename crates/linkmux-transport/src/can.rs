//! CAN link backend over Linux SocketCAN.
//!
//! The interface itself (bitrate, up/down) is system-managed via `ip link`;
//! this backend only opens a raw socket on an already-configured interface.
//! The configured bitrate is carried for diagnostics and logging.

use std::time::Duration;

use bytes::Bytes;
use linkmux_frame::{check_can_payload, Frame, CAN_MAX_PAYLOAD};
use socketcan::{
    CanFilter, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, SocketOptions,
    StandardId,
};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connectable, FrameReader, FrameWriter};

/// Acceptance mask covering the full 11-bit standard identifier.
pub const STANDARD_ID_MASK: u32 = 0x7FF;
/// Acceptance mask covering the full 29-bit extended identifier.
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Configuration for a CAN link.
#[derive(Debug, Clone)]
pub struct CanConfig {
    /// SocketCAN interface name, e.g. `can0`.
    pub interface: String,
    /// Nominal bus bitrate; informational, the kernel owns the real setting.
    pub bitrate: u32,
    /// Arbitration identifier used for sends and for the receive filter.
    pub arbitration_id: u32,
    pub extended_id: bool,
    /// Install a kernel-side acceptance filter on `arbitration_id`.
    pub use_filter: bool,
    pub read_timeout: Duration,
}

impl CanConfig {
    pub fn new(interface: impl Into<String>, arbitration_id: u32) -> Self {
        Self {
            interface: interface.into(),
            bitrate: 250_000,
            arbitration_id,
            extended_id: false,
            use_filter: false,
            read_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn extended(mut self) -> Self {
        self.extended_id = true;
        self
    }

    pub fn with_filter(mut self) -> Self {
        self.use_filter = true;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// A CAN link bound to one SocketCAN interface.
#[derive(Debug)]
pub struct CanLink {
    config: CanConfig,
    socket: Option<CanSocket>,
}

impl CanLink {
    pub fn new(config: CanConfig) -> Result<Self> {
        let max = if config.extended_id {
            EXTENDED_ID_MASK
        } else {
            STANDARD_ID_MASK
        };
        if config.arbitration_id > max {
            return Err(TransportError::InvalidConfig(format!(
                "arbitration id {:#x} does not fit a {} identifier",
                config.arbitration_id,
                if config.extended_id {
                    "29-bit extended"
                } else {
                    "11-bit standard"
                },
            )));
        }
        Ok(Self {
            config,
            socket: None,
        })
    }

    fn make_id(&self, raw: u32) -> Result<Id> {
        let id = if self.config.extended_id {
            ExtendedId::new(raw).map(Id::Extended)
        } else {
            u16::try_from(raw)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard)
        };
        id.ok_or_else(|| {
            TransportError::InvalidConfig(format!("identifier {raw:#x} out of range for bus"))
        })
    }
}

impl Connectable for CanLink {
    fn connect(&mut self) -> Result<()> {
        let socket =
            CanSocket::open(&self.config.interface).map_err(|e| TransportError::Connect {
                endpoint: self.config.interface.clone(),
                source: e,
            })?;
        if self.config.use_filter {
            let mask = if self.config.extended_id {
                EXTENDED_ID_MASK
            } else {
                STANDARD_ID_MASK
            };
            socket.set_filters(&[CanFilter::new(self.config.arbitration_id, mask)])?;
        }
        debug!(
            interface = %self.config.interface,
            bitrate = self.config.bitrate,
            id = self.config.arbitration_id,
            "CAN socket opened"
        );
        self.socket = Some(socket);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            debug!(interface = %self.config.interface, "CAN socket closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.config.interface
    }

    fn protocol(&self) -> &'static str {
        "can"
    }
}

impl FrameWriter for CanLink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        check_can_payload(frame.payload.len())?;
        let raw = frame.id.unwrap_or(self.config.arbitration_id);
        let id = self.make_id(raw)?;
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        let can_frame = CanFrame::new(id, &frame.payload).ok_or_else(|| {
            TransportError::InvalidConfig("CAN frame rejected by socket layer".to_string())
        })?;
        socket.write_frame(&can_frame)?;
        Ok(())
    }

    fn max_payload(&self) -> Option<usize> {
        Some(CAN_MAX_PAYLOAD)
    }
}

impl FrameReader for CanLink {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        match socket.read_frame_timeout(self.config.read_timeout) {
            Ok(can_frame) => {
                let raw = match can_frame.id() {
                    Id::Standard(id) => u32::from(id.as_raw()),
                    Id::Extended(id) => id.as_raw(),
                };
                Ok(Some(Frame::new(
                    raw,
                    Bytes::copy_from_slice(can_frame.data()),
                )))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_common_bus_setup() {
        let config = CanConfig::new("can0", 0x123);
        assert_eq!(config.bitrate, 250_000);
        assert!(!config.extended_id);
        assert!(!config.use_filter);
    }

    #[test]
    fn standard_id_must_fit_eleven_bits() {
        assert!(CanLink::new(CanConfig::new("can0", 0x7FF)).is_ok());
        let err = CanLink::new(CanConfig::new("can0", 0x800)).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }

    #[test]
    fn extended_id_must_fit_twentynine_bits() {
        assert!(CanLink::new(CanConfig::new("can0", 0x1FFF_FFFF).extended()).is_ok());
        let err = CanLink::new(CanConfig::new("can0", 0x2000_0000).extended()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }

    #[test]
    fn payload_limit_is_classical_can() {
        let link = CanLink::new(CanConfig::new("can0", 1)).unwrap();
        assert_eq!(link.max_payload(), Some(8));
    }
}
