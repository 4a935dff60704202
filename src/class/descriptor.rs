//! Structural member descriptors.
//!
//! A descriptor records only the *shape* of a member: how many parameters it
//! takes, which value category each occupies, and what category it returns.
//! Member names in the host are opaque strings with no symbolic meaning, so
//! shape is the only reliable half of a structural signature.
//!
//! # Grammar
//!
//! Descriptors have a compact textual form stored in the constant pool:
//!
//! ```text
//! descriptor := '(' param* ')' return
//! param      := 'i' | 'l' | 'f' | 'd' | 'A' | 'L' name ';'
//! return     := param | 'v'
//! ```
//!
//! `i`/`l`/`f`/`d` are the 32/64-bit integer and float categories, `A` is an
//! anonymous reference, `L<name>;` a reference carrying a class name, and `v`
//! (return position only) is void. A field descriptor is a method descriptor
//! with no parameters whose return position holds the field's kind.
//!
//! # Examples
//!
//! ```rust
//! use hostgraft::class::MethodDesc;
//!
//! let desc = MethodDesc::parse("(iLworld;)f")?;
//! assert_eq!(desc.params.len(), 2);
//! assert_eq!(desc.to_string(), "(iLworld;)f");
//! # Ok::<(), hostgraft::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::Result;

/// Value category of a single parameter slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// 32-bit integer (also carries booleans)
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Reference; `Some(name)` when the declaring side pinned a class name
    Ref(Option<Arc<str>>),
}

impl ParamKind {
    /// True for the four primitive categories.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ParamKind::Ref(_))
    }

    /// True when both kinds occupy the same value category, ignoring any
    /// reference class name. This is the compatibility the member locator
    /// filters on.
    pub fn same_category(&self, other: &ParamKind) -> bool {
        matches!(
            (self, other),
            (ParamKind::I32, ParamKind::I32)
                | (ParamKind::I64, ParamKind::I64)
                | (ParamKind::F32, ParamKind::F32)
                | (ParamKind::F64, ParamKind::F64)
                | (ParamKind::Ref(_), ParamKind::Ref(_))
        )
    }
}

/// Value category of a return position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// No value is returned
    Void,
    /// A value of the given parameter category
    Value(ParamKind),
}

impl ReturnKind {
    /// True when the return carries one of the numeric categories.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ReturnKind::Value(ParamKind::I32)
                | ReturnKind::Value(ParamKind::I64)
                | ReturnKind::Value(ParamKind::F32)
                | ReturnKind::Value(ParamKind::F64)
        )
    }
}

/// Parsed structural signature of a method or field.
///
/// For fields, `params` is empty and `ret` holds the field's kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDesc {
    /// Parameter categories, in declaration order (receiver not included)
    pub params: Vec<ParamKind>,
    /// Return category
    pub ret: ReturnKind,
}

impl MethodDesc {
    /// Builds a descriptor from parts.
    pub fn new(params: Vec<ParamKind>, ret: ReturnKind) -> Self {
        MethodDesc { params, ret }
    }

    /// Builds a field descriptor holding a single kind.
    pub fn field(kind: ParamKind) -> Self {
        MethodDesc {
            params: Vec::new(),
            ret: ReturnKind::Value(kind),
        }
    }

    /// Parses the textual descriptor grammar.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on any deviation from the grammar.
    pub fn parse(text: &str) -> Result<MethodDesc> {
        let bytes = text.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed_error!("Descriptor '{text}' does not start with '('"));
        }

        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let (kind, next) = Self::parse_kind(text, pos)?;
                    params.push(kind);
                    pos = next;
                }
                None => return Err(malformed_error!("Descriptor '{text}' is unterminated")),
            }
        }

        let ret = if bytes.get(pos) == Some(&b'v') {
            pos += 1;
            ReturnKind::Void
        } else {
            let (kind, next) = Self::parse_kind(text, pos)?;
            pos = next;
            ReturnKind::Value(kind)
        };

        if pos != bytes.len() {
            return Err(malformed_error!("Trailing data in descriptor '{text}'"));
        }
        Ok(MethodDesc { params, ret })
    }

    fn parse_kind(text: &str, pos: usize) -> Result<(ParamKind, usize)> {
        let bytes = text.as_bytes();
        match bytes.get(pos) {
            Some(b'i') => Ok((ParamKind::I32, pos + 1)),
            Some(b'l') => Ok((ParamKind::I64, pos + 1)),
            Some(b'f') => Ok((ParamKind::F32, pos + 1)),
            Some(b'd') => Ok((ParamKind::F64, pos + 1)),
            Some(b'A') => Ok((ParamKind::Ref(None), pos + 1)),
            Some(b'L') => {
                let rest = &text[pos + 1..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| malformed_error!("Unterminated class name in '{text}'"))?;
                if end == 0 {
                    return Err(malformed_error!("Empty class name in descriptor '{text}'"));
                }
                let name: Arc<str> = Arc::from(&rest[..end]);
                Ok((ParamKind::Ref(Some(name)), pos + 1 + end + 1))
            }
            other => Err(malformed_error!(
                "Unexpected descriptor byte {:?} in '{text}'",
                other
            )),
        }
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for param in &self.params {
            write_kind(f, param)?;
        }
        write!(f, ")")?;
        match &self.ret {
            ReturnKind::Void => write!(f, "v"),
            ReturnKind::Value(kind) => write_kind(f, kind),
        }
    }
}

fn write_kind(f: &mut fmt::Formatter<'_>, kind: &ParamKind) -> fmt::Result {
    match kind {
        ParamKind::I32 => write!(f, "i"),
        ParamKind::I64 => write!(f, "l"),
        ParamKind::F32 => write!(f, "f"),
        ParamKind::F64 => write!(f, "d"),
        ParamKind::Ref(None) => write!(f, "A"),
        ParamKind::Ref(Some(name)) => write!(f, "L{name};"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        let desc = MethodDesc::parse("(ilfd)v").unwrap();
        assert_eq!(desc.params.len(), 4);
        assert_eq!(desc.ret, ReturnKind::Void);
    }

    #[test]
    fn test_parse_named_ref() {
        let desc = MethodDesc::parse("(Lworld;A)Lblock;").unwrap();
        assert_eq!(
            desc.params[0],
            ParamKind::Ref(Some(Arc::from("world")))
        );
        assert_eq!(desc.params[1], ParamKind::Ref(None));
        assert!(matches!(desc.ret, ReturnKind::Value(ParamKind::Ref(Some(_)))));
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["()v", "(i)i", "(Lworld;dA)f", "(lfd)Lentity;"] {
            assert_eq!(MethodDesc::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        for text in ["", "i)v", "(x)v", "(i)", "(Lworld)v", "(i)vv", "(L;)v"] {
            assert!(MethodDesc::parse(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_category_compatibility() {
        let anon = ParamKind::Ref(None);
        let named = ParamKind::Ref(Some(Arc::from("world")));
        assert!(anon.same_category(&named));
        assert!(!ParamKind::I32.same_category(&ParamKind::I64));
        assert!(!ParamKind::F64.same_category(&anon));
    }
}
