//! Scope-checked encoder with back-patched length headers.

use crate::Error;
use crate::MAX_DEPTH;
use crate::Result;
use crate::Scope;
use crate::Tag;
use crate::Value;

/// An open container on the `Encoder` stack.
struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A bounded, state-machine driven encoder.
///
/// The encoder keeps a stack of open scopes and back-patches each container's
/// length when the scope closes.
///
/// # Structural Invariants
///
/// 1.  **Map Scopes**: Only entries may be written.
/// 2.  **Entry Scopes**: Exactly one item must follow the key.
/// 3.  **Root Scope**: The encoder must end in the Root scope to finalize bytes.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Encoder {
    pub fn new() -> Self {
        let mut enc = Self {
            buf: Vec::with_capacity(256),
            stack: Vec::with_capacity(8),
        };
        enc.stack.push(Frame { start: 0, scope: Scope::Root, count: 0 });
        enc
    }

    /// Consumes the encoder and returns the final bytes.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if a container is still open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn frame(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.frame();
        match frame.scope {
            Scope::Root | Scope::List if tag == Tag::Entry => Err(Error::InvalidMapEntry),
            Scope::Root | Scope::List => Ok(()),
            Scope::Map if tag == Tag::Entry => Ok(()),
            Scope::Map => Err(Error::InvalidMapEntry),
            Scope::Entry if frame.count >= 1 => Err(Error::InvalidMapEntry),
            Scope::Entry => Ok(()),
        }
    }

    fn written(&mut self) {
        self.frame().count += 1;
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.written();
        Ok(())
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| Error::BlobTooLarge(data.len()))?;
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(data);
        self.written();
        Ok(())
    }

    fn begin(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }
        {
            let frame = self.frame();
            if frame.scope != expected {
                return Err(Error::ScopeMismatch { expected, actual: frame.scope });
            }
            if frame.scope == Scope::Entry && frame.count != 1 {
                return Err(Error::InvalidMapEntry);
            }
        }

        let Some(frame) = self.stack.pop() else {
            return Err(Error::ScopeUnderflow);
        };
        let body_len = self.buf.len() - frame.start;
        let len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[frame.start - 4..frame.start].copy_from_slice(&len.to_le_bytes());
        self.written();
        Ok(())
    }

    pub fn nil(&mut self) -> Result<()> { self.scalar(Tag::Nil, &[]) }
    pub fn bool(&mut self, v: bool) -> Result<()> { self.scalar(if v { Tag::True } else { Tag::False }, &[]) }
    pub fn int(&mut self, v: i64) -> Result<()> { self.scalar(Tag::Int, &v.to_le_bytes()) }
    pub fn uint(&mut self, v: u64) -> Result<()> { self.scalar(Tag::UInt, &v.to_le_bytes()) }
    pub fn float(&mut self, v: f64) -> Result<()> { self.scalar(Tag::Float, &v.to_le_bytes()) }
    pub fn str(&mut self, v: &str) -> Result<()> { self.blob(Tag::String, v.as_bytes()) }
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.blob(Tag::Bytes, v) }

    /// Begins a list. Must be closed with `list_end()`.
    pub fn list_begin(&mut self) -> Result<()> { self.begin(Tag::List, Scope::List) }
    pub fn list_end(&mut self) -> Result<()> { self.end(Scope::List) }

    /// Begins a map. Only `entry_begin()` is allowed as a direct child.
    pub fn map_begin(&mut self) -> Result<()> { self.begin(Tag::Map, Scope::Map) }
    pub fn map_end(&mut self) -> Result<()> { self.end(Scope::Map) }

    /// Begins a map entry and writes its key.
    ///
    /// Exactly one value must be written before `entry_end()`.
    pub fn entry_begin(&mut self, key: &str) -> Result<()> {
        self.begin(Tag::Entry, Scope::Entry)?;
        self.str(key)?;
        // The key is metadata; the entry still expects its one value.
        self.frame().count = 0;
        Ok(())
    }
    pub fn entry_end(&mut self) -> Result<()> { self.end(Scope::Entry) }

    /// Encodes a whole `Value` tree.
    ///
    /// # Errors
    /// Returns `Error::DepthExceeded` for trees nested deeper than `MAX_DEPTH`,
    /// which `decode` would refuse.
    pub fn value(&mut self, value: &Value) -> Result<()> {
        self.value_at(value, 0)
    }

    fn value_at(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        match value {
            Value::Nil => self.nil(),
            Value::Bool(v) => self.bool(*v),
            Value::Int(v) => self.int(*v),
            Value::UInt(v) => self.uint(*v),
            Value::Float(v) => self.float(*v),
            Value::String(v) => self.str(v),
            Value::Bytes(v) => self.bytes(v),
            Value::List(items) => {
                self.list_begin()?;
                for item in items {
                    self.value_at(item, depth + 1)?;
                }
                self.list_end()
            }
            Value::Map(entries) => {
                self.map_begin()?;
                for (key, item) in entries {
                    self.entry_begin(key)?;
                    self.value_at(item, depth + 1)?;
                    self.entry_end()?;
                }
                self.map_end()
            }
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
