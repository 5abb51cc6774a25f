//! # Flowport
//!
//! Named, encoded units of streaming data and the signals that close them.
//!
//! ## Architecture
//!
//! A [`Packet`] belongs to one port and carries either a flowpack-encoded
//! payload, a done signal, or an error signal. The packet enum makes the
//! invariants structural: signals never carry a payload, and errors always
//! carry a message.
//!
//! [`wire`] lowers packets to `wasmtime::component::Val` records and lifts them
//! back, checking every record a guest hands over against the same invariants.

mod error;
mod packet;
pub mod wire;

#[cfg(test)]
mod tests;

pub use error::Error;
pub use error::Result;
pub use packet::Packet;
pub use packet::PacketKind;
pub use packet::SYSTEM_PORT;
