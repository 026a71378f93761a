/// Errors that can occur on a physical link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the physical endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation was attempted on a link that is not connected.
    #[error("link not connected")]
    NotConnected,

    /// A framing error while encoding or decoding on this link.
    #[error("framing error: {0}")]
    Frame(#[from] linkmux_frame::FrameError),

    /// The link configuration is invalid for this transport.
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// True for framing/decode errors, which drop a single frame; everything
    /// else indicates the link itself failed and needs a reconnect.
    pub fn is_framing(&self) -> bool {
        matches!(self, TransportError::Frame(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
