//! # Component Boundary
//!
//! Translation between [`Packet`] and the WIT record a guest sees:
//!
//! ```wit
//! record packet {
//!     port: string,
//!     payload: option<list<u8>>,
//!     done: bool,
//!     error: option<string>,
//! }
//! ```
//!
//! ## Invariants
//! - **Strict Lifting**: A record is only accepted if it satisfies the packet
//!   invariants; guests cannot smuggle a payload on a signal.
//! - **Forward Compatibility**: Unknown record fields are ignored.

use wasmtime::component::Val;

use crate::error::Error;
use crate::error::Result;
use crate::packet::Packet;
use crate::packet::PacketKind;

/// Lowers a byte buffer to a `list<u8>` value.
pub fn bytes_to_val(bytes: &[u8]) -> Val {
    Val::List(bytes.iter().map(|b| Val::U8(*b)).collect())
}

/// Lifts a `list<u8>` value to a byte buffer.
pub fn val_to_bytes(val: &Val) -> Result<Vec<u8>> {
    let Val::List(items) = val else {
        return Err(mismatch("list<u8>", val));
    };
    items
        .iter()
        .map(|item| match item {
            Val::U8(b) => Ok(*b),
            other => Err(mismatch("u8", other)),
        })
        .collect()
}

/// Lowers a packet to its record value.
pub fn to_val(packet: &Packet) -> Val {
    let (payload, done, error) = match packet.kind() {
        PacketKind::Data(bytes) => (Some(Box::new(bytes_to_val(bytes))), false, None),
        PacketKind::Done => (None, true, None),
        PacketKind::Error(msg) => (None, false, Some(Box::new(Val::String(msg.clone())))),
    };

    Val::Record(vec![
        ("port".into(), Val::String(packet.port().to_string())),
        ("payload".into(), Val::Option(payload)),
        ("done".into(), Val::Bool(done)),
        ("error".into(), Val::Option(error)),
    ])
}

/// Lifts a record value into a packet.
///
/// # Errors
/// - `TypeMismatch` / `MissingField` when the value is not a packet record.
/// - `ProtocolViolation` when the record breaks a packet invariant.
pub fn from_val(val: &Val) -> Result<Packet> {
    let Val::Record(fields) = val else {
        return Err(mismatch("record", val));
    };

    let mut port = None;
    let mut payload = None;
    let mut done = None;
    let mut error = None;

    for (name, field) in fields {
        match name.as_str() {
            "port" => match field {
                Val::String(s) => port = Some(s.clone()),
                other => return Err(mismatch("string", other)),
            },
            "payload" => match field {
                Val::Option(opt) => payload = Some(opt.as_deref().map(val_to_bytes).transpose()?),
                other => return Err(mismatch("option<list<u8>>", other)),
            },
            "done" => match field {
                Val::Bool(b) => done = Some(*b),
                other => return Err(mismatch("bool", other)),
            },
            "error" => match field {
                Val::Option(None) => error = Some(None),
                Val::Option(Some(inner)) => match inner.as_ref() {
                    Val::String(s) => error = Some(Some(s.clone())),
                    other => return Err(mismatch("string", other)),
                },
                other => return Err(mismatch("option<string>", other)),
            },
            _ => {}
        }
    }

    let port = port.ok_or_else(|| Error::MissingField("port".into()))?;
    let payload = payload.ok_or_else(|| Error::MissingField("payload".into()))?;
    let done = done.ok_or_else(|| Error::MissingField("done".into()))?;
    let error = error.ok_or_else(|| Error::MissingField("error".into()))?;

    if port.is_empty() {
        return Err(Error::InvalidPort(port));
    }

    match (payload, done, error) {
        (Some(bytes), false, None) => Packet::data(port, bytes),
        (None, true, None) => Ok(Packet::done(port)),
        (None, false, Some(msg)) => Ok(Packet::error(port, msg)),
        (None, false, None) => Err(Error::ProtocolViolation(format!(
            "packet on port {:?} carries neither payload nor signal",
            port
        ))),
        _ => Err(Error::ProtocolViolation(format!(
            "packet on port {:?} mixes payload and signals",
            port
        ))),
    }
}

fn mismatch(expected: &str, found: &Val) -> Error {
    Error::TypeMismatch { expected: expected.to_string(), found: val_desc(found).to_string() }
}

/// Short type description of a value for error messages.
fn val_desc(val: &Val) -> &'static str {
    match val {
        Val::Bool(_) => "bool",
        Val::U8(_) => "u8",
        Val::S8(_) => "s8",
        Val::U16(_) => "u16",
        Val::S16(_) => "s16",
        Val::U32(_) => "u32",
        Val::S32(_) => "s32",
        Val::U64(_) => "u64",
        Val::S64(_) => "s64",
        Val::Float32(_) => "f32",
        Val::Float64(_) => "f64",
        Val::Char(_) => "char",
        Val::String(_) => "string",
        Val::List(_) => "list",
        Val::Record(_) => "record",
        Val::Tuple(_) => "tuple",
        Val::Variant(..) => "variant",
        Val::Enum(_) => "enum",
        Val::Option(_) => "option",
        Val::Result(_) => "result",
        Val::Flags(_) => "flags",
        Val::Resource(_) => "resource",
        _ => "value",
    }
}
