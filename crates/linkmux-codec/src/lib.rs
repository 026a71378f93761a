//! Typed fixed-width wire schemas for control-link payloads.
//!
//! Microcontroller links carry packed binary records: a fixed sequence of
//! primitive fields in a fixed byte order. A [`Schema`] describes that layout
//! once, at construction; [`pack`] and [`unpack`] then convert between
//! [`Value`] slices and raw bytes, validating field count and total width on
//! every call.
//!
//! This crate is the codec collaborator consumed by driver code. It knows
//! nothing about transports or framing.

pub mod error;
pub mod pack;
pub mod schema;
pub mod value;

pub use error::{CodecError, Result};
pub use pack::{pack, unpack};
pub use schema::{ByteOrder, Field, Schema};
pub use value::Value;
