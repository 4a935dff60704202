//! Parsed representation of a host class blob and its exact byte codec.
//!
//! A class blob is what the host's loader hands to the transform engine: a
//! header, the class's place in the hierarchy, a constant pool, and the field
//! and method tables. Parsing and encoding are exact inverses - a class that
//! is parsed and re-encoded without modification produces the original bytes,
//! which is what lets the engine return "unchanged" cheaply and safely.
//!
//! # Layout
//!
//! ```text
//! magic      u32      0x47545246
//! version    u16      format version (currently 1)
//! flags      u16      class access flags
//! name       str      this class
//! super      u8+str   optional superclass name
//! interfaces u16+str* implemented interface names
//! pool       ...      constant pool
//! fields     u16+{flags u16, name str, desc str}*
//! methods    u16+{flags u16, name str, desc str, max_stack u16,
//!                  max_locals u16, code u32+bytes, eh u16+{u32 u32 u32}*}*
//! ```

use bitflags::bitflags;

use crate::class::descriptor::MethodDesc;
use crate::class::io::{read_le_at, read_str_at, write_str, ClassIO};
use crate::class::pool::ConstantPool;
use crate::Result;

/// Magic number at the start of every class blob (`"GRFT"`).
pub const CLASS_MAGIC: u32 = 0x4754_5246;

/// Format version this crate reads and writes.
pub const CLASS_VERSION: u16 = 1;

bitflags! {
    /// Access flags of a class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u16 {
        /// Visible outside its defining scope
        const PUBLIC = 0x0001;
        /// May not be subclassed
        const FINAL = 0x0002;
        /// An interface rather than a concrete class
        const INTERFACE = 0x0004;
    }
}

bitflags! {
    /// Access flags of a field or method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberFlags: u16 {
        /// Visible outside the declaring class
        const PUBLIC = 0x0001;
        /// Belongs to the class, not an instance
        const STATIC = 0x0002;
        /// May not be overridden
        const FINAL = 0x0004;
        /// Declared without a body
        const ABSTRACT = 0x0008;
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field access flags
    pub flags: MemberFlags,
    /// Field name (opaque, no symbolic meaning)
    pub name: String,
    /// Field descriptor; `params` is empty, `ret` holds the field kind
    pub desc: MethodDesc,
}

/// One entry in a method's exception table.
///
/// Offsets are byte offsets into the method's encoded code. `try_end` is
/// exclusive. An exception raised by an instruction in `[try_start, try_end)`
/// transfers control to `handler` with the thrown reference as the only
/// operand stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// First covered byte offset (inclusive)
    pub try_start: u32,
    /// End of the covered range (exclusive)
    pub try_end: u32,
    /// Byte offset of the handler's first instruction
    pub handler: u32,
}

/// One declared method, including its compiled body.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// Method access flags
    pub flags: MemberFlags,
    /// Method name (opaque, no symbolic meaning)
    pub name: String,
    /// Structural signature
    pub desc: MethodDesc,
    /// Declared operand stack ceiling
    pub max_stack: u16,
    /// Number of local variable slots, parameters included
    pub max_locals: u16,
    /// Encoded instruction stream; empty for abstract methods
    pub code: Vec<u8>,
    /// Exception table, in handler priority order
    pub exceptions: Vec<ExceptionEntry>,
}

impl Method {
    /// True when this method has no body to rewrite.
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MemberFlags::ABSTRACT)
    }

    /// True when this method has no receiver slot.
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }
}

/// A fully parsed host class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Class access flags
    pub flags: ClassFlags,
    /// Class name
    pub name: String,
    /// Superclass name, absent only for the hierarchy root
    pub superclass: Option<String>,
    /// Implemented interface names
    pub interfaces: Vec<String>,
    /// Constant pool shared by all method bodies
    pub pool: ConstantPool,
    /// Declared fields
    pub fields: Vec<Field>,
    /// Declared methods
    pub methods: Vec<Method>,
}

impl ClassFile {
    /// Parses a class blob.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] when the
    /// input deviates from the format; trailing bytes are rejected.
    pub fn from_bytes(data: &[u8]) -> Result<ClassFile> {
        if data.is_empty() {
            return Err(malformed_error!("Provided class data is empty"));
        }

        let mut pos = 0;
        let magic = read_le_at::<u32>(data, &mut pos)?;
        if magic != CLASS_MAGIC {
            return Err(malformed_error!("Bad class magic 0x{magic:08X}"));
        }
        let version = read_le_at::<u16>(data, &mut pos)?;
        if version != CLASS_VERSION {
            return Err(malformed_error!("Unsupported class format version {version}"));
        }

        let flags = ClassFlags::from_bits_truncate(read_le_at::<u16>(data, &mut pos)?);
        let name = read_str_at(data, &mut pos)?;

        let superclass = if read_le_at::<u8>(data, &mut pos)? != 0 {
            Some(read_str_at(data, &mut pos)?)
        } else {
            None
        };

        let interface_count = read_le_at::<u16>(data, &mut pos)?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(read_str_at(data, &mut pos)?);
        }

        let pool = ConstantPool::parse(data, &mut pos)?;

        let field_count = read_le_at::<u16>(data, &mut pos)?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let flags = MemberFlags::from_bits_truncate(read_le_at::<u16>(data, &mut pos)?);
            let name = read_str_at(data, &mut pos)?;
            let desc = MethodDesc::parse(&read_str_at(data, &mut pos)?)?;
            if !desc.params.is_empty() {
                return Err(malformed_error!("Field '{name}' has a method descriptor"));
            }
            fields.push(Field { flags, name, desc });
        }

        let method_count = read_le_at::<u16>(data, &mut pos)?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(Self::parse_method(data, &mut pos)?);
        }

        if pos != data.len() {
            return Err(malformed_error!(
                "{} trailing bytes after class '{name}'",
                data.len() - pos
            ));
        }

        Ok(ClassFile {
            flags,
            name,
            superclass,
            interfaces,
            pool,
            fields,
            methods,
        })
    }

    fn parse_method(data: &[u8], pos: &mut usize) -> Result<Method> {
        let flags = MemberFlags::from_bits_truncate(read_le_at::<u16>(data, pos)?);
        let name = read_str_at(data, pos)?;
        let desc = MethodDesc::parse(&read_str_at(data, pos)?)?;
        let max_stack = read_le_at::<u16>(data, pos)?;
        let max_locals = read_le_at::<u16>(data, pos)?;

        let code_len = read_le_at::<u32>(data, pos)? as usize;
        let end = pos.checked_add(code_len).ok_or(crate::Error::OutOfBounds)?;
        if end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }
        let code = data[*pos..end].to_vec();
        *pos = end;

        if flags.contains(MemberFlags::ABSTRACT) && !code.is_empty() {
            return Err(malformed_error!("Abstract method '{name}' carries code"));
        }

        let eh_count = read_le_at::<u16>(data, pos)?;
        let mut exceptions = Vec::with_capacity(eh_count as usize);
        for _ in 0..eh_count {
            let entry = ExceptionEntry {
                try_start: read_le_at::<u32>(data, pos)?,
                try_end: read_le_at::<u32>(data, pos)?,
                handler: read_le_at::<u32>(data, pos)?,
            };
            if entry.try_start >= entry.try_end {
                return Err(malformed_error!(
                    "Empty exception range {}..{} in method '{name}'",
                    entry.try_start,
                    entry.try_end
                ));
            }
            exceptions.push(entry);
        }

        Ok(Method {
            flags,
            name,
            desc,
            max_stack,
            max_locals,
            code,
            exceptions,
        })
    }

    /// Encodes the class back into blob form.
    ///
    /// # Errors
    /// [`crate::Error::Malformed`] if a name or string constant exceeds the
    /// format's length limits.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(256);
        CLASS_MAGIC.put_le(&mut out);
        CLASS_VERSION.put_le(&mut out);
        self.flags.bits().put_le(&mut out);
        write_str(&mut out, &self.name)?;

        match &self.superclass {
            Some(name) => {
                1_u8.put_le(&mut out);
                write_str(&mut out, name)?;
            }
            None => 0_u8.put_le(&mut out),
        }

        #[allow(clippy::cast_possible_truncation)]
        (self.interfaces.len() as u16).put_le(&mut out);
        for name in &self.interfaces {
            write_str(&mut out, name)?;
        }

        self.pool.encode(&mut out)?;

        #[allow(clippy::cast_possible_truncation)]
        (self.fields.len() as u16).put_le(&mut out);
        for field in &self.fields {
            field.flags.bits().put_le(&mut out);
            write_str(&mut out, &field.name)?;
            write_str(&mut out, &field.desc.to_string())?;
        }

        #[allow(clippy::cast_possible_truncation)]
        (self.methods.len() as u16).put_le(&mut out);
        for method in &self.methods {
            method.flags.bits().put_le(&mut out);
            write_str(&mut out, &method.name)?;
            write_str(&mut out, &method.desc.to_string())?;
            method.max_stack.put_le(&mut out);
            method.max_locals.put_le(&mut out);
            #[allow(clippy::cast_possible_truncation)]
            (method.code.len() as u32).put_le(&mut out);
            out.extend_from_slice(&method.code);
            #[allow(clippy::cast_possible_truncation)]
            (method.exceptions.len() as u16).put_le(&mut out);
            for entry in &method.exceptions {
                entry.try_start.put_le(&mut out);
                entry.try_end.put_le(&mut out);
                entry.handler.put_le(&mut out);
            }
        }

        Ok(out)
    }

    /// Finds a declared field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
