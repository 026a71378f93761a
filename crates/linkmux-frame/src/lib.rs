//! Per-transport framing codecs for multiplexed control links.
//!
//! Every logical message on a shared physical channel is carried as a frame:
//! an identifier plus a raw payload. How the identifier rides the wire is
//! transport-specific:
//!
//! - Serial: software header `[id][length][payload][terminator]`
//! - CAN: hardware arbitration id, payload only (max 8 bytes)
//! - SPI: polled software header `[length][id][payload]` or fixed-size packets
//!
//! The codecs here are pure byte-level transforms over [`bytes::BytesMut`];
//! the I/O bindings live in `linkmux-transport`.

pub mod can;
pub mod error;
pub mod frame;
pub mod serial;
pub mod spi;

pub use can::{check_can_payload, CAN_MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use frame::Frame;
pub use serial::{SerialFraming, MAX_HEADERED_PAYLOAD};
pub use spi::SpiFraming;
