//! Driver instances over control links.
//!
//! This crate turns a raw link into named, supervised driver instances:
//!
//! - [`Registry`] — process-wide bookkeeping of instances, identifiers and
//!   per-channel message state
//! - [`ConnectRetry`] — asymmetric connect policies (bounded at startup,
//!   unbounded mid-run)
//! - [`LinkSender`] — single-flight send path with reconnect-on-failure
//!   under a wall-clock deadline
//! - [`LinkReceiver`] — non-blocking reads from a per-channel dispatch
//!   loop that owns the link
//!
//! A typical setup opens one sender and any number of receivers over links
//! from `linkmux-transport`, all sharing [`Registry::shared`].

mod dispatcher;
mod logging;

pub mod error;
pub mod lifecycle;
pub mod receiver;
pub mod registry;
pub mod sender;

pub use error::{DriverError, Result};
pub use lifecycle::{CancelToken, ConnectRetry};
pub use receiver::{LinkReceiver, ReceiveOptions};
pub use registry::{ChannelStats, InstanceInfo, Operation, Registry};
pub use sender::{LinkSender, SendOptions};
