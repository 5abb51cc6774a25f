//! Zero-copy decoding cursor.

use std::collections::BTreeMap;

use crate::Error;
use crate::MAX_DEPTH;
use crate::Result;
use crate::Tag;
use crate::Value;

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Reading advances the cursor. Container reads return iterators over a new
/// `Decoder` restricted to the container's body.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let Some(&b) = self.buf.first() else {
            return Err(Error::UnexpectedEnd);
        };
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn expect(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag != expected {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.read_bytes(1)?;
        Ok(())
    }

    fn enter(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.expect(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.read_bytes(1)?;
        match tag {
            Tag::Nil | Tag::True | Tag::False => {}
            Tag::Int | Tag::UInt | Tag::Float => {
                self.read_bytes(8)?;
            }
            Tag::String | Tag::Bytes | Tag::List | Tag::Map | Tag::Entry => {
                let len = self.read_len()?;
                self.read_bytes(len)?;
            }
        }
        Ok(())
    }

    pub fn nil(&mut self) -> Result<()> { self.expect(Tag::Nil) }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::True => { self.read_bytes(1)?; Ok(true) }
            Tag::False => { self.read_bytes(1)?; Ok(false) }
            tag => Err(Error::InvalidTag(tag as u8)),
        }
    }

    pub fn int(&mut self) -> Result<i64> { self.expect(Tag::Int)?; Ok(i64::from_le_bytes(self.read_array()?)) }
    pub fn uint(&mut self) -> Result<u64> { self.expect(Tag::UInt)?; Ok(u64::from_le_bytes(self.read_array()?)) }
    pub fn float(&mut self) -> Result<f64> { self.expect(Tag::Float)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        self.expect(Tag::String)?;
        let len = self.read_len()?;
        std::str::from_utf8(self.read_bytes(len)?).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.expect(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Decodes a List into an iterator of item decoders.
    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter(Tag::List)? })
    }

    /// Decodes a Map into an iterator of `(key, value decoder)` pairs.
    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter(Tag::Map)? })
    }

    /// Decodes the next complete `Value` tree.
    pub fn value(&mut self) -> Result<Value> {
        self.value_at(0)
    }

    fn value_at(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        match self.peek_tag()? {
            Tag::Nil => self.nil().map(|_| Value::Nil),
            Tag::True | Tag::False => self.bool().map(Value::Bool),
            Tag::Int => self.int().map(Value::Int),
            Tag::UInt => self.uint().map(Value::UInt),
            Tag::Float => self.float().map(Value::Float),
            Tag::String => self.str().map(|s| Value::String(s.to_string())),
            Tag::Bytes => self.bytes().map(|b| Value::Bytes(b.to_vec())),
            Tag::List => {
                let mut iter = self.list()?;
                let mut items = Vec::new();
                while let Some(mut item) = iter.next()? {
                    items.push(item.value_at(depth + 1)?);
                }
                Ok(Value::List(items))
            }
            Tag::Map => {
                let mut iter = self.map()?;
                let mut entries = BTreeMap::new();
                while let Some((key, mut item)) = iter.next()? {
                    let value = item.value_at(depth + 1)?;
                    if item.remaining() > 0 {
                        return Err(Error::InvalidMapEntry);
                    }
                    if entries.insert(key.to_string(), value).is_some() {
                        return Err(Error::DuplicateKey(key.to_string()));
                    }
                }
                Ok(Value::Map(entries))
            }
            Tag::Entry => Err(Error::InvalidMapEntry),
        }
    }
}

/// Iterator over the items of a List.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a Decoder scoped to the next item, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        let mut probe = self.dec.clone();
        probe.skip()?;
        let len = self.dec.remaining() - probe.remaining();
        Ok(Some(Decoder::new(self.dec.read_bytes(len)?)))
    }
}

/// Iterator over the entries of a Map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(key, value decoder)` for the next entry, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.remaining() == 0 {
            return Ok(None);
        }
        if self.dec.peek_tag()? != Tag::Entry {
            return Err(Error::InvalidMapEntry);
        }
        let mut entry = self.dec.enter(Tag::Entry)?;
        let key = entry.str()?;
        Ok(Some((key, entry)))
    }
}
