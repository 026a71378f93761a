/// Errors that can occur while framing or deframing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the transport's frame limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload contains the serial terminator byte.
    ///
    /// Line-delimited serial framing cannot carry the terminator inside a
    /// payload; this is a protocol limitation, not a transient fault.
    #[error("payload contains terminator byte 0x{terminator:02x}")]
    TerminatorInPayload { terminator: u8 },

    /// An identifier header is configured but the frame carries no id.
    #[error("frame has no identifier but the framing requires one")]
    MissingIdentifier,

    /// The identifier does not fit the configured header width.
    #[error("identifier 0x{id:x} does not fit a {width}-byte header")]
    IdentifierTooWide { id: u32, width: usize },

    /// A frame's declared length was satisfied but the terminator is absent.
    #[error("frame not closed by terminator")]
    MissingTerminator,

    /// A packet is shorter than its configured headers.
    #[error("packet truncated (need {needed} bytes, have {have})")]
    Truncated { needed: usize, have: usize },

    /// A header width outside the supported range was configured.
    #[error("invalid {what} width {width} (supported: 0-4)")]
    InvalidWidth { what: &'static str, width: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
