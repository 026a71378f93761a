//! Capability traits and link backends for control-link transports.
//!
//! A link is a connected physical endpoint that can carry frames. Instead of
//! one deep driver hierarchy, each backend implements small capability
//! traits independently:
//!
//! - [`Connectable`] — open/close the physical endpoint
//! - [`FrameWriter`] — frame and write one message
//! - [`FrameReader`] — poll for the next inbound frame
//!
//! Backends: [`SerialLink`] (USB/UART), [`CanLink`] (SocketCAN, Linux),
//! [`SpiLink`] (spidev, Linux), and [`MockLink`] for tests and examples.

pub mod error;
pub mod mock;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(all(feature = "can", target_os = "linux"))]
pub mod can;

#[cfg(all(feature = "spi", target_os = "linux"))]
pub mod spi;

pub use error::{Result, TransportError};
pub use mock::{MockHandle, MockLink};
pub use traits::{Connectable, FrameReader, FrameWriter};

#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialLink};

#[cfg(all(feature = "can", target_os = "linux"))]
pub use can::{CanConfig, CanLink};

#[cfg(all(feature = "spi", target_os = "linux"))]
pub use spi::{SpiConfig, SpiLink};
