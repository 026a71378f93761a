use bytes::Bytes;

/// One transport-level unit: an identifier and a raw payload.
///
/// `id` is `None` for links configured without an identifier header — the
/// "don't-care" singleton of a channel's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The logical message identifier, or `None` when the link carries a
    /// single anonymous message.
    pub id: Option<u32>,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: impl Into<Option<u32>>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}
