use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// Maximum payload length when the one-byte length header is in use.
pub const MAX_HEADERED_PAYLOAD: usize = u8::MAX as usize;

/// Serial framing: terminator-delimited, with an optional software header.
///
/// Wire format with an identifier header of `id_width` bytes:
/// ```text
/// ┌────────────────┬─────────────┬──────────────────┬────────────────┐
/// │ id (N B, LE)   │ length (1B) │ payload          │ terminator (1B)│
/// └────────────────┴─────────────┴──────────────────┴────────────────┘
/// ```
/// With `id_width == 0` the frame is just `[payload][terminator]` and the
/// channel carries a single anonymous message.
#[derive(Debug, Clone)]
pub struct SerialFraming {
    id_width: usize,
    terminator: u8,
}

impl SerialFraming {
    /// Default frame terminator.
    pub const DEFAULT_TERMINATOR: u8 = b'\n';

    /// Create a serial framing with an id header of `id_width` bytes (0-4).
    pub fn new(id_width: usize) -> Result<Self> {
        Self::with_terminator(id_width, Self::DEFAULT_TERMINATOR)
    }

    /// Create a serial framing with an explicit terminator byte.
    pub fn with_terminator(id_width: usize, terminator: u8) -> Result<Self> {
        if id_width > 4 {
            return Err(FrameError::InvalidWidth {
                what: "identifier",
                width: id_width,
            });
        }
        Ok(Self {
            id_width,
            terminator,
        })
    }

    /// Configured identifier header width in bytes.
    pub fn id_width(&self) -> usize {
        self.id_width
    }

    /// Configured terminator byte.
    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Encode a frame into the wire format.
    ///
    /// The payload may not contain the terminator byte — the deframer on the
    /// other end is line-delimited and would split the frame early.
    pub fn encode(&self, id: Option<u32>, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        if payload.contains(&self.terminator) {
            return Err(FrameError::TerminatorInPayload {
                terminator: self.terminator,
            });
        }

        if self.id_width == 0 {
            dst.reserve(payload.len() + 1);
            dst.put_slice(payload);
            dst.put_u8(self.terminator);
            return Ok(());
        }

        let id = id.ok_or(FrameError::MissingIdentifier)?;
        check_id_fits(id, self.id_width)?;
        if payload.len() > MAX_HEADERED_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_HEADERED_PAYLOAD,
            });
        }

        dst.reserve(self.id_width + 1 + payload.len() + 1);
        dst.put_slice(&id.to_le_bytes()[..self.id_width]);
        dst.put_u8(payload.len() as u8);
        dst.put_slice(payload);
        dst.put_u8(self.terminator);
        Ok(())
    }

    /// Decode the next frame from a receive buffer.
    ///
    /// Returns `Ok(None)` if the buffer does not yet hold a complete frame;
    /// the caller keeps reading until the declared length (plus terminator)
    /// is satisfied. On success the frame's bytes are consumed from `src`.
    /// A malformed frame is consumed before the error returns, so the caller
    /// can resynchronize by simply continuing.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.id_width == 0 {
            let Some(pos) = src.iter().position(|b| *b == self.terminator) else {
                return Ok(None);
            };
            let payload = src.split_to(pos).freeze();
            src.advance(1);
            return Ok(Some(Frame { id: None, payload }));
        }

        let header = self.id_width + 1;
        if src.len() < header {
            return Ok(None);
        }

        let mut id_bytes = [0u8; 4];
        id_bytes[..self.id_width].copy_from_slice(&src[..self.id_width]);
        let id = u32::from_le_bytes(id_bytes);
        let len = src[self.id_width] as usize;

        let total = header + len + 1;
        if src.len() < total {
            return Ok(None);
        }

        if src[total - 1] != self.terminator {
            tracing::warn!(id, len, "serial frame not closed by terminator, dropping");
            src.advance(total);
            return Err(FrameError::MissingTerminator);
        }

        src.advance(header);
        let payload = src.split_to(len).freeze();
        src.advance(1);
        Ok(Some(Frame {
            id: Some(id),
            payload,
        }))
    }
}

fn check_id_fits(id: u32, width: usize) -> Result<()> {
    let max = if width >= 4 {
        u32::MAX
    } else {
        (1u32 << (width * 8)) - 1
    };
    if id > max {
        return Err(FrameError::IdentifierTooWide { id, width });
    }
    Ok(())
}
