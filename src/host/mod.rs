//! The live host object boundary.
//!
//! At run time the host hands opaque objects to code this crate injected.
//! Nothing about those objects is known at build time except what can be
//! observed structurally: the concrete class they belong to, that class's
//! ancestor chain, and the declared shape of its members. This module is that
//! observation surface.
//!
//! The embedder (whatever shim sits between the host process and this crate)
//! implements [`HostObject`] once; everything above - the member locator, the
//! classification cache, the whole adapter layer - works exclusively through
//! it and [`HostClass`].
//!
//! # Key Types
//! - [`HostClass`] - Concrete class identity: name, ancestors, member table
//! - [`HostMember`] / [`MemberHandle`] - A declared member and a resolved,
//!   cacheable handle to it
//! - [`HostObject`] / [`HostRef`] - A live instance and the shared pointer
//!   the dispatch layer passes around
//! - [`HostValue`] - The value universe crossing the boundary
//!
//! # Example
//! ```rust
//! use hostgraft::host::{HostClass, HostMember, MemberKind};
//! use hostgraft::class::MethodDesc;
//!
//! let entity = HostClass::root("ce");
//! let living = HostClass::new("cq", Some(entity), Vec::new());
//! living.push_member(HostMember::method("eZ", MethodDesc::parse("()f")?));
//! assert_eq!(living.superclass().unwrap().name().as_ref(), "ce");
//! # Ok::<(), hostgraft::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use strum::Display;
use uuid::Uuid;

use crate::class::MethodDesc;
use crate::Result;

/// Whether a member is callable or a storage slot.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A callable member
    Method,
    /// A field
    Field,
}

/// One declared member of a host class, as observed structurally.
#[derive(Debug, Clone)]
pub struct HostMember {
    /// Opaque member name, pinned per host version
    pub name: String,
    /// Method or field
    pub kind: MemberKind,
    /// Structural signature; for fields `params` is empty and `ret` holds
    /// the field kind
    pub desc: MethodDesc,
}

impl HostMember {
    /// Declares a method member.
    pub fn method(name: &str, desc: MethodDesc) -> HostMember {
        HostMember {
            name: name.to_string(),
            kind: MemberKind::Method,
            desc,
        }
    }

    /// Declares a field member.
    pub fn field(name: &str, desc: MethodDesc) -> HostMember {
        HostMember {
            name: name.to_string(),
            kind: MemberKind::Field,
            desc,
        }
    }
}

/// Concrete class identity of a live host object.
///
/// Links to its ancestors directly, so classification can walk the chain
/// without any global lookup. The member table is append-only
/// (`boxcar::Vec`), letting the embedder fill it in while handles into it
/// stay valid and shareable.
pub struct HostClass {
    name: Arc<str>,
    superclass: Option<Arc<HostClass>>,
    interfaces: Vec<Arc<HostClass>>,
    members: boxcar::Vec<HostMember>,
}

impl HostClass {
    /// Creates a class with the given ancestors.
    pub fn new(
        name: &str,
        superclass: Option<Arc<HostClass>>,
        interfaces: Vec<Arc<HostClass>>,
    ) -> Arc<HostClass> {
        Arc::new(HostClass {
            name: Arc::from(name),
            superclass,
            interfaces,
            members: boxcar::Vec::new(),
        })
    }

    /// Creates a hierarchy root (no superclass, no interfaces).
    pub fn root(name: &str) -> Arc<HostClass> {
        Self::new(name, None, Vec::new())
    }

    /// The class name. Exact class identity for every cache in this crate.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Direct superclass, if any.
    pub fn superclass(&self) -> Option<&Arc<HostClass>> {
        self.superclass.as_ref()
    }

    /// Directly implemented interfaces.
    pub fn interfaces(&self) -> &[Arc<HostClass>] {
        &self.interfaces
    }

    /// Appends a declared member, returning its index.
    pub fn push_member(&self, member: HostMember) -> usize {
        self.members.push(member)
    }

    /// Iterates declared members with their indices.
    pub fn members(&self) -> impl Iterator<Item = (usize, &HostMember)> {
        self.members.iter()
    }

    /// The member at `index`, if declared.
    pub fn member(&self, index: usize) -> Option<&HostMember> {
        self.members.get(index)
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|c| c.name.clone()))
            .field("members", &self.members.count())
            .finish()
    }
}

/// A resolved handle to one member of one class.
///
/// Produced by the member locator, cached per concrete class, and passed to
/// [`HostObject`] calls. Resolution is the expensive part; a handle, once
/// created, is immutable and shared freely.
#[derive(Debug, Clone)]
pub struct MemberHandle {
    /// The class declaring the member
    pub owner: Arc<HostClass>,
    /// Index into the owner's member table
    pub index: usize,
}

impl MemberHandle {
    /// The declared member this handle refers to.
    pub fn member(&self) -> Option<&HostMember> {
        self.owner.member(self.index)
    }
}

/// A value crossing the host boundary.
///
/// The universe is deliberately small: the primitive categories the class
/// format knows, strings, stable identities, opaque object references, lists
/// of the above, and null.
#[derive(Clone)]
pub enum HostValue {
    /// No value (void returns)
    Unit,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// String
    Str(String),
    /// Stable identity (entities keep theirs across wrapper lifetimes)
    Uuid(Uuid),
    /// Opaque object reference
    Object(HostRef),
    /// Multiple values (collections returned by the host)
    List(Vec<HostValue>),
    /// The null reference
    Null,
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Unit => f.write_str("Unit"),
            HostValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            HostValue::I32(v) => f.debug_tuple("I32").field(v).finish(),
            HostValue::I64(v) => f.debug_tuple("I64").field(v).finish(),
            HostValue::F32(v) => f.debug_tuple("F32").field(v).finish(),
            HostValue::F64(v) => f.debug_tuple("F64").field(v).finish(),
            HostValue::Str(v) => f.debug_tuple("Str").field(v).finish(),
            HostValue::Uuid(v) => f.debug_tuple("Uuid").field(v).finish(),
            HostValue::Object(obj) => f
                .debug_tuple("Object")
                .field(&obj.class().name())
                .finish(),
            HostValue::List(v) => f.debug_tuple("List").field(v).finish(),
            HostValue::Null => f.write_str("Null"),
        }
    }
}

impl HostValue {
    /// Numeric coercion to f64, for any of the four numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::I32(v) => Some(f64::from(*v)),
            #[allow(clippy::cast_precision_loss)]
            HostValue::I64(v) => Some(*v as f64),
            HostValue::F32(v) => Some(f64::from(*v)),
            HostValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric coercion to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::I32(v) => Some(i64::from(*v)),
            HostValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// The boolean payload; also accepts the host's i32-encoded booleans.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(v) => Some(*v),
            HostValue::I32(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// The string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The stable identity payload.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            HostValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    /// The object payload.
    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            HostValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// The list payload.
    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// True for the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }
}

/// A live, opaque host object.
///
/// Implemented by the embedder. All invocation goes through member handles
/// the locator resolved against the object's own [`HostClass`]; the
/// implementation may fail any call, and everything above recovers with
/// documented defaults.
pub trait HostObject: Send + Sync {
    /// The concrete class of this instance.
    fn class(&self) -> Arc<HostClass>;

    /// Invokes a method member.
    ///
    /// # Errors
    /// [`crate::Error::InvocationFailure`] when the host-side call fails.
    fn call(&self, member: &MemberHandle, args: &[HostValue]) -> Result<HostValue>;

    /// Reads a field member.
    ///
    /// # Errors
    /// [`crate::Error::InvocationFailure`] when the host-side read fails.
    fn get(&self, member: &MemberHandle) -> Result<HostValue>;

    /// Writes a field member.
    ///
    /// # Errors
    /// [`crate::Error::InvocationFailure`] when the host-side write fails.
    fn set(&self, member: &MemberHandle, value: HostValue) -> Result<()>;
}

/// Shared pointer to a live host object, as passed between injected code,
/// the dispatch layer, and adapters.
pub type HostRef = Arc<dyn HostObject>;
