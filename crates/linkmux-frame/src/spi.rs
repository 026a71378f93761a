use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// SPI framing: polled software headers, or fixed-size blind packets.
///
/// Wire format with headers (both big-endian):
/// ```text
/// ┌──────────────────┬────────────────┬──────────┐
/// │ length (M B, BE) │ id (N B, BE)   │ payload  │
/// └──────────────────┴────────────────┴──────────┘
/// ```
/// With both header widths at zero, every poll cycle exchanges exactly
/// `packet_size` bytes. Full-duplex polling has no "no data" signal: an idle
/// bus still yields `packet_size` bytes of fill. Distinguishing fill from
/// payload needs an external convention (e.g. a reserved sentinel
/// identifier); this layer does not solve it.
#[derive(Debug, Clone)]
pub struct SpiFraming {
    len_width: usize,
    id_width: usize,
    packet_size: usize,
}

impl SpiFraming {
    /// Default blind-poll packet size.
    pub const DEFAULT_PACKET_SIZE: usize = 256;

    /// Create an SPI framing. Header widths of 0 disable that header; with
    /// both disabled, `packet_size` bytes are exchanged per poll.
    pub fn new(len_width: usize, id_width: usize, packet_size: usize) -> Result<Self> {
        if len_width > 4 {
            return Err(FrameError::InvalidWidth {
                what: "length",
                width: len_width,
            });
        }
        if id_width > 4 {
            return Err(FrameError::InvalidWidth {
                what: "identifier",
                width: id_width,
            });
        }
        if len_width == 0 && id_width == 0 && packet_size == 0 {
            return Err(FrameError::InvalidWidth {
                what: "packet",
                width: 0,
            });
        }
        Ok(Self {
            len_width,
            id_width,
            packet_size,
        })
    }

    /// Length header width in bytes.
    pub fn len_width(&self) -> usize {
        self.len_width
    }

    /// Identifier header width in bytes.
    pub fn id_width(&self) -> usize {
        self.id_width
    }

    /// Blind-poll packet size in bytes.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// True when no headers are configured and polls are fixed-size.
    pub fn is_headerless(&self) -> bool {
        self.len_width == 0 && self.id_width == 0
    }

    /// Encode a frame into the wire format.
    pub fn encode(&self, id: Option<u32>, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        if self.len_width > 0 {
            let max = max_for_width(self.len_width);
            if payload.len() as u64 > max {
                return Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max: max as usize,
                });
            }
        }

        dst.reserve(self.len_width + self.id_width + payload.len());
        if self.len_width > 0 {
            let len = (payload.len() as u32).to_be_bytes();
            dst.put_slice(&len[4 - self.len_width..]);
        }
        if self.id_width > 0 {
            let id = id.ok_or(FrameError::MissingIdentifier)?;
            if id as u64 > max_for_width(self.id_width) {
                return Err(FrameError::IdentifierTooWide {
                    id,
                    width: self.id_width,
                });
            }
            dst.put_slice(&id.to_be_bytes()[4 - self.id_width..]);
        }
        dst.put_slice(payload);
        Ok(())
    }

    /// Parse the payload length from a length-header read.
    pub fn parse_len(&self, header: &[u8]) -> Result<usize> {
        if header.len() < self.len_width {
            return Err(FrameError::Truncated {
                needed: self.len_width,
                have: header.len(),
            });
        }
        let mut bytes = [0u8; 4];
        bytes[4 - self.len_width..].copy_from_slice(&header[..self.len_width]);
        Ok(u32::from_be_bytes(bytes) as usize)
    }

    /// Decode a complete polled packet (headers included) into a frame.
    ///
    /// Headerless packets decode as anonymous frames carrying the whole
    /// packet as payload.
    pub fn decode_packet(&self, raw: &[u8]) -> Result<Frame> {
        let header = self.len_width + self.id_width;
        if raw.len() < header {
            return Err(FrameError::Truncated {
                needed: header,
                have: raw.len(),
            });
        }

        let body = &raw[self.len_width..];
        let (id, payload) = if self.id_width > 0 {
            let mut bytes = [0u8; 4];
            bytes[4 - self.id_width..].copy_from_slice(&body[..self.id_width]);
            (
                Some(u32::from_be_bytes(bytes)),
                Bytes::copy_from_slice(&body[self.id_width..]),
            )
        } else {
            (None, Bytes::copy_from_slice(body))
        };

        Ok(Frame { id, payload })
    }
}

fn max_for_width(width: usize) -> u64 {
    (1u64 << (width * 8)) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headered_wire_shape_is_big_endian() {
        let framing = SpiFraming::new(2, 1, 0).unwrap();
        let mut buf = BytesMut::new();
        framing.encode(Some(0x42), b"abc", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), [0x00, 0x03, 0x42, b'a', b'b', b'c']);
    }

    #[test]
    fn headered_roundtrip() {
        let framing = SpiFraming::new(1, 2, 0).unwrap();
        let mut buf = BytesMut::new();
        framing.encode(Some(0x1234), b"payload", &mut buf).unwrap();

        let frame = framing.decode_packet(&buf).unwrap();
        assert_eq!(frame.id, Some(0x1234));
        assert_eq!(frame.payload.as_ref(), b"payload");
    }

    #[test]
    fn parse_len_reads_big_endian_header() {
        let framing = SpiFraming::new(2, 0, 0).unwrap();
        assert_eq!(framing.parse_len(&[0x01, 0x02]).unwrap(), 0x0102);
    }

    #[test]
    fn headerless_packet_is_anonymous() {
        let framing = SpiFraming::new(0, 0, 4).unwrap();
        assert!(framing.is_headerless());
        let frame = framing.decode_packet(&[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.id, None);
        assert_eq!(frame.payload.as_ref(), [1, 2, 3, 4]);
    }

    #[test]
    fn truncated_packet_rejected() {
        let framing = SpiFraming::new(2, 2, 0).unwrap();
        let err = framing.decode_packet(&[0x00]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { needed: 4, have: 1 }));
    }

    #[test]
    fn id_required_when_header_configured() {
        let framing = SpiFraming::new(0, 1, 0).unwrap();
        let mut buf = BytesMut::new();
        let err = framing.encode(None, b"x", &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::MissingIdentifier));
    }

    #[test]
    fn payload_must_fit_length_header() {
        let framing = SpiFraming::new(1, 0, 0).unwrap();
        let mut buf = BytesMut::new();
        let payload = vec![0u8; 300];
        let err = framing.encode(None, &payload, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { max: 255, .. }));
    }

    #[test]
    fn headerless_needs_packet_size() {
        assert!(matches!(
            SpiFraming::new(0, 0, 0),
            Err(FrameError::InvalidWidth { .. })
        ));
        assert!(SpiFraming::new(0, 0, SpiFraming::DEFAULT_PACKET_SIZE).is_ok());
    }
}
