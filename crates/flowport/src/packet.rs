use flowpack::Value;

use crate::error::Error;
use crate::error::Result;

/// Port reserved for errors synthesized by the runtime itself
/// (traps, timeouts, termination) rather than emitted by a component.
pub const SYSTEM_PORT: &str = "<system>";

/// What a packet carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketKind {
    /// A flowpack-encoded value.
    Data(Vec<u8>),
    /// No more data will follow on this port.
    Done,
    /// The producer failed; the message describes why.
    Error(String),
}

/// One named unit of streaming data, or a done/error signal for a port.
///
/// Packets are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    port: String,
    kind: PacketKind,
}

impl Packet {
    /// Builds a data packet from an already-encoded payload.
    ///
    /// # Errors
    /// Returns `Error::InvalidPort` if `port` is empty.
    pub fn data(port: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let port = port.into();
        if port.is_empty() {
            return Err(Error::InvalidPort(port));
        }
        Ok(Self { port, kind: PacketKind::Data(payload.into()) })
    }

    /// Encodes `value` and wraps it in a data packet.
    pub fn encode(port: impl Into<String>, value: &Value) -> Result<Self> {
        Self::data(port, flowpack::encode(value)?)
    }

    /// Builds a done signal for `port`.
    ///
    /// Unlike [`Packet::data`] this does not validate `port`: the runtime
    /// builds signals for ports it already knows. Packets lifted from a
    /// component are checked by [`crate::wire::from_val`], which rejects an
    /// empty port.
    pub fn done(port: impl Into<String>) -> Self {
        Self { port: port.into(), kind: PacketKind::Done }
    }

    /// Builds an error signal for `port`. Not validated, as with [`Packet::done`].
    pub fn error(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self { port: port.into(), kind: PacketKind::Error(message.into()) }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn kind(&self) -> &PacketKind {
        &self.kind
    }

    /// The encoded payload; `None` for signals.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.kind {
            PacketKind::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.kind, PacketKind::Done)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, PacketKind::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            PacketKind::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Decodes the payload; `None` for signals.
    pub fn decode(&self) -> Option<flowpack::Result<Value>> {
        self.payload().map(flowpack::decode)
    }
}
