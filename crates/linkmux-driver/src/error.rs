use std::time::Duration;

use crate::registry::Operation;

/// Errors from the driver layer: registration, lifecycle, send and receive.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An instance with this name is already registered.
    #[error("driver instance name already in use: {0}")]
    DuplicateName(String),

    /// The identifier is already claimed by another instance on the same
    /// channel and operation.
    #[error("identifier {id:#x} already in use for {operation} on channel {channel}")]
    IdentifierConflict {
        channel: String,
        operation: Operation,
        id: u32,
    },

    /// An anonymous instance shares a channel/operation with another
    /// instance; inbound frames could not be told apart.
    #[error("anonymous {operation} conflicts with existing instance on channel {channel}")]
    AnonymousConflict {
        channel: String,
        operation: Operation,
    },

    /// No registered instance under this name.
    #[error("unknown driver instance: {0}")]
    UnknownInstance(String),

    /// The instance has been stopped and no longer accepts operations.
    #[error("driver instance {0} is stopped")]
    Stopped(String),

    /// The codec layout can never fit the transport's payload limit.
    #[error("message layout of {width} bytes exceeds transport limit of {max}")]
    OversizePayload { width: usize, max: usize },

    /// The startup connect policy ran out of attempts.
    #[error("could not connect to {endpoint} after {attempts} attempts")]
    ConnectExhausted { endpoint: String, attempts: u32 },

    /// Another send on this instance is already in flight.
    #[error("a send is already in flight on this instance")]
    SendBusy,

    /// The send deadline elapsed before the message went out.
    #[error("send did not complete within {timeout:?}")]
    SendTimeout { timeout: Duration },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Could not spawn the dispatch thread.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Transport(#[from] linkmux_transport::TransportError),

    #[error(transparent)]
    Codec(#[from] linkmux_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, DriverError>;
