//! Constant pool for host class blobs.
//!
//! Instructions and member references never embed strings or structured data
//! directly; they carry u16 indices into the owning class's pool. The pool is
//! append-only during rewriting - the transform engine interns the strings and
//! member references its injected code needs and existing indices stay valid.

use crate::class::io::{read_le_at, read_str_at, write_str, ClassIO};
use crate::{Error, Result};

const TAG_UTF8: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_CLASS: u8 = 0x04;
const TAG_MEMBER: u8 = 0x05;

/// One entry in a class constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    /// UTF-8 text (names, descriptors, string literals)
    Utf8(String),
    /// 64-bit integer constant
    Int(i64),
    /// 64-bit float constant
    Float(f64),
    /// Reference to a class; the index points at the Utf8 class name
    ClassRef(u16),
    /// Reference to a member of some class
    MemberRef {
        /// Utf8 index of the owning class name
        owner: u16,
        /// Utf8 index of the member name
        name: u16,
        /// Utf8 index of the member descriptor
        desc: u16,
    },
}

/// A resolved member reference with its pool indirections followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefData<'a> {
    /// Owning class name
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor text
    pub desc: &'a str,
}

/// Append-only constant pool of a single class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        ConstantPool::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] when the index is out of range.
    pub fn get(&self, index: u16) -> Result<&PoolEntry> {
        self.entries
            .get(index as usize)
            .ok_or(Error::PoolIndex(index))
    }

    /// Returns the Utf8 text at `index`.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] when the index is out of range or not Utf8.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            PoolEntry::Utf8(text) => Ok(text),
            _ => Err(Error::PoolIndex(index)),
        }
    }

    /// Resolves a `MemberRef` entry, following its Utf8 indirections.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] when the index is not a member reference or any
    /// of its indirections is invalid.
    pub fn member_ref(&self, index: u16) -> Result<MemberRefData<'_>> {
        match self.get(index)? {
            PoolEntry::MemberRef { owner, name, desc } => Ok(MemberRefData {
                owner: self.utf8(*owner)?,
                name: self.utf8(*name)?,
                desc: self.utf8(*desc)?,
            }),
            _ => Err(Error::PoolIndex(index)),
        }
    }

    /// Interns a Utf8 string, reusing an existing entry when present.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] if the pool would exceed the u16 index space.
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16> {
        for (i, entry) in self.entries.iter().enumerate() {
            if matches!(entry, PoolEntry::Utf8(existing) if existing == text) {
                #[allow(clippy::cast_possible_truncation)]
                return Ok(i as u16);
            }
        }
        self.push(PoolEntry::Utf8(text.to_string()))
    }

    /// Interns a member reference by its three text components.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] if the pool would exceed the u16 index space.
    pub fn intern_member(&mut self, owner: &str, name: &str, desc: &str) -> Result<u16> {
        let owner = self.intern_utf8(owner)?;
        let name = self.intern_utf8(name)?;
        let desc = self.intern_utf8(desc)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if matches!(entry, PoolEntry::MemberRef { owner: o, name: n, desc: d }
                if *o == owner && *n == name && *d == desc)
            {
                #[allow(clippy::cast_possible_truncation)]
                return Ok(i as u16);
            }
        }
        self.push(PoolEntry::MemberRef { owner, name, desc })
    }

    /// Appends an entry, returning its index.
    ///
    /// # Errors
    /// [`Error::PoolIndex`] if the pool would exceed the u16 index space.
    pub fn push(&mut self, entry: PoolEntry) -> Result<u16> {
        let index = u16::try_from(self.entries.len())
            .map_err(|_| Error::PoolIndex(u16::MAX))?;
        self.entries.push(entry);
        Ok(index)
    }

    /// Parses a pool from `data` at `*pos`, advancing the cursor.
    ///
    /// # Errors
    /// [`Error::Malformed`] or [`Error::OutOfBounds`] on invalid input.
    pub fn parse(data: &[u8], pos: &mut usize) -> Result<ConstantPool> {
        let count = read_le_at::<u16>(data, pos)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = read_le_at::<u8>(data, pos)?;
            let entry = match tag {
                TAG_UTF8 => PoolEntry::Utf8(read_str_at(data, pos)?),
                TAG_INT => PoolEntry::Int(read_le_at::<i64>(data, pos)?),
                TAG_FLOAT => PoolEntry::Float(read_le_at::<f64>(data, pos)?),
                TAG_CLASS => PoolEntry::ClassRef(read_le_at::<u16>(data, pos)?),
                TAG_MEMBER => PoolEntry::MemberRef {
                    owner: read_le_at::<u16>(data, pos)?,
                    name: read_le_at::<u16>(data, pos)?,
                    desc: read_le_at::<u16>(data, pos)?,
                },
                other => return Err(malformed_error!("Unknown pool entry tag 0x{other:02X}")),
            };
            entries.push(entry);
        }
        Ok(ConstantPool { entries })
    }

    /// Appends the encoded pool to `out`.
    ///
    /// # Errors
    /// [`Error::Malformed`] if a string entry exceeds the format's length limit.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        (self.entries.len() as u16).put_le(out);
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(text) => {
                    TAG_UTF8.put_le(out);
                    write_str(out, text)?;
                }
                PoolEntry::Int(value) => {
                    TAG_INT.put_le(out);
                    value.put_le(out);
                }
                PoolEntry::Float(value) => {
                    TAG_FLOAT.put_le(out);
                    value.put_le(out);
                }
                PoolEntry::ClassRef(index) => {
                    TAG_CLASS.put_le(out);
                    index.put_le(out);
                }
                PoolEntry::MemberRef { owner, name, desc } => {
                    TAG_MEMBER.put_le(out);
                    owner.put_le(out);
                    name.put_le(out);
                    desc.put_le(out);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_utf8("health").unwrap();
        let b = pool.intern_utf8("health").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_member_ref_resolution() {
        let mut pool = ConstantPool::new();
        let idx = pool.intern_member("hostgraft/Hooks", "player_chat", "(AA)i").unwrap();
        let data = pool.member_ref(idx).unwrap();
        assert_eq!(data.owner, "hostgraft/Hooks");
        assert_eq!(data.name, "player_chat");
        assert_eq!(data.desc, "(AA)i");
        // Interning the same triple again reuses the entry
        let again = pool.intern_member("hostgraft/Hooks", "player_chat", "(AA)i").unwrap();
        assert_eq!(idx, again);
    }

    #[test]
    fn test_wrong_kind_lookup_fails() {
        let mut pool = ConstantPool::new();
        let idx = pool.push(PoolEntry::Int(7)).unwrap();
        assert!(pool.utf8(idx).is_err());
        assert!(pool.member_ref(idx).is_err());
        assert!(pool.get(99).is_err());
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let mut pool = ConstantPool::new();
        pool.intern_utf8("entity").unwrap();
        pool.push(PoolEntry::Int(-5)).unwrap();
        pool.push(PoolEntry::Float(2.5)).unwrap();
        let name = pool.intern_utf8("cq").unwrap();
        pool.push(PoolEntry::ClassRef(name)).unwrap();
        pool.intern_member("cq", "a", "()f").unwrap();

        let mut bytes = Vec::new();
        pool.encode(&mut bytes).unwrap();
        let mut pos = 0;
        let parsed = ConstantPool::parse(&bytes, &mut pos).unwrap();
        assert_eq!(pos, bytes.len());
        assert_eq!(parsed, pool);
    }
}
