//! # Flowpack
//!
//! A small, deterministic, schema-agnostic codec for packet payloads.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Maps are ordered by key, so equal values always encode to equal bytes.
//! - **TLV Architecture**: `[Tag][Length?][Value]` structure enables safe skipping of unknown items.
//! - **Bounded**: Encoders track scopes explicitly. Decoders are zero-copy, bounds-checked views
//!   with a fixed nesting limit.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! A map body is a sequence of entries; an entry is a container holding a key
//! string followed by exactly one value. All integers are Little-Endian.

mod decoder;
mod encoder;
mod value;

#[cfg(feature = "json")]
mod json;


pub use decoder::Decoder;
pub use decoder::ListIter;
pub use decoder::MapIter;
pub use encoder::Encoder;
pub use value::Value;

/// The maximum nesting depth accepted by `decode`.
pub const MAX_DEPTH: usize = 64;

/// Flowpack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// A complete value was read but bytes remain.
    TrailingBytes(usize),
    /// Values nested deeper than `MAX_DEPTH`.
    DepthExceeded,
    /// Closing a scope that does not match the active scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the Root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// A map held something other than an entry, or an entry did not hold exactly one value.
    InvalidMapEntry,
    /// The same key appeared twice in one map.
    DuplicateKey(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "Invalid tag byte: {:#04x}", b),
            Error::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
            Error::UnexpectedEnd => write!(f, "Unexpected end of input"),
            Error::BlobTooLarge(len) => write!(f, "Blob of {} bytes exceeds u32 length", len),
            Error::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
            Error::DepthExceeded => write!(f, "Nesting deeper than {} levels", MAX_DEPTH),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "Scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::DuplicateKey(key) => write!(f, "Duplicate map key: {:?}", key),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for flowpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of the encoded item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Nil = 0x01,
    True = 0x02,
    False = 0x03,
    Int = 0x04,
    UInt = 0x05,
    Float = 0x06,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,
    Entry = 0x22,
}

impl Tag {
    /// Returns the Tag for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::Nil),
            0x02 => Some(Tag::True),
            0x03 => Some(Tag::False),
            0x04 => Some(Tag::Int),
            0x05 => Some(Tag::UInt),
            0x06 => Some(Tag::Float),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x22 => Some(Tag::Entry),
            _ => None,
        }
    }
}

/// Encoder scope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any item.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Keyed container; strictly allows only entries.
    Map,
    /// One map entry; allows exactly one item after the key.
    Entry,
}

/// Serializes a value into its canonical byte form.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.value(value)?;
    enc.into_bytes()
}

/// Deserializes exactly one value from `bytes`.
///
/// # Errors
/// Fails on truncated or malformed input, on nesting deeper than `MAX_DEPTH`,
/// and when bytes remain after the value.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let mut dec = Decoder::new(bytes);
    let value = dec.value()?;
    if dec.remaining() > 0 {
        return Err(Error::TrailingBytes(dec.remaining()));
    }
    Ok(value)
}
