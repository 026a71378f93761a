//! Transport-agnostic driver framework for embedded control links.
//!
//! `linkmux` multiplexes named driver instances over shared physical
//! channels (serial ports, CAN buses, SPI devices). Each instance sends or
//! receives one message kind, identified by an optional numeric id; a
//! per-channel dispatch loop demultiplexes inbound frames while senders
//! ride out link failures behind a wall-clock deadline.
//!
//! The layers are published as separate crates and re-exported here:
//!
//! - [`codec`] — fixed-width record packing ([`Schema`], [`Value`])
//! - [`frame`] — per-transport wire framing
//! - [`transport`] — capability traits and link backends
//! - [`driver`] — registry, lifecycle, send path and dispatcher
//!
//! ```no_run
//! use linkmux::{
//!     ByteOrder, Field, LinkSender, Registry, Schema, SendOptions, SerialConfig, SerialLink,
//!     Value,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SerialConfig::new("/dev/ttyUSB0").with_id_width(1);
//!     let link = SerialLink::new(config)?;
//!     let schema = Schema::new([Field::F32, Field::F32], ByteOrder::Little);
//!
//!     let sender = LinkSender::open(
//!         "setpoint-tx",
//!         schema,
//!         link,
//!         Registry::shared(),
//!         SendOptions::default().with_identifier(0x21),
//!     )?;
//!     sender.send(&[Value::Float(1.5), Value::Float(-0.25)])?;
//!     Ok(())
//! }
//! ```

pub use linkmux_codec as codec;
pub use linkmux_driver as driver;
pub use linkmux_frame as frame;
pub use linkmux_transport as transport;

pub mod logging;

pub use linkmux_codec::{ByteOrder, CodecError, Field, Schema, Value};
pub use linkmux_driver::{
    CancelToken, ChannelStats, ConnectRetry, DriverError, InstanceInfo, LinkReceiver, LinkSender,
    Operation, ReceiveOptions, Registry, SendOptions,
};
pub use linkmux_frame::{Frame, FrameError};
pub use linkmux_transport::{
    Connectable, FrameReader, FrameWriter, MockHandle, MockLink, TransportError,
};

#[cfg(feature = "serial")]
pub use linkmux_transport::{SerialConfig, SerialLink};

#[cfg(all(feature = "can", target_os = "linux"))]
pub use linkmux_transport::{CanConfig, CanLink};

#[cfg(all(feature = "spi", target_os = "linux"))]
pub use linkmux_transport::{SpiConfig, SpiLink};
