use linkmux_frame::Frame;

use crate::error::Result;

/// A physical endpoint that can be opened and closed.
///
/// `disconnect` must be idempotent: closing an already-closed link is a
/// no-op. The retry policies in the driver layer call it unconditionally on
/// any I/O failure.
pub trait Connectable {
    /// Open the physical endpoint. One attempt; retry policy lives above.
    fn connect(&mut self) -> Result<()>;

    /// Close the physical endpoint. Idempotent.
    fn disconnect(&mut self);

    /// Whether the endpoint is currently open.
    fn is_connected(&self) -> bool;

    /// The channel identifier this link is bound to (port path, bus name,
    /// or bus.device pair).
    fn endpoint(&self) -> &str;

    /// Short label for the transport kind, e.g. `"serial"` or `"can"`.
    fn protocol(&self) -> &'static str;
}

/// A link that can frame and write one outbound message.
pub trait FrameWriter: Connectable {
    /// Serialize the frame per this transport's framing and write it.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// The transport's fixed payload limit, if it has one (CAN: 8 bytes;
    /// serial with a length header: 255). Checked at configuration time
    /// against codec layouts.
    fn max_payload(&self) -> Option<usize> {
        None
    }
}

/// A link that can poll for the next inbound frame.
pub trait FrameReader: Connectable {
    /// Block up to the transport's poll timeout for one frame.
    ///
    /// `Ok(None)` means the poll timed out with no complete frame — not an
    /// error. Framing errors surface as [`TransportError::Frame`]
    /// (one frame dropped); any other error means the link failed.
    ///
    /// [`TransportError::Frame`]: crate::TransportError::Frame
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}
