//! The host's class format: descriptors, constant pools, and class blobs.
//!
//! The host application compiles its classes into an opaque binary format;
//! this module is the crate's model of that format. It is the input side of
//! the transform engine - the loader hands over a blob, [`ClassFile`] gives it
//! structure, and the engine either returns it untouched or re-encodes a
//! rewritten version that the host's own structural verifier will accept.
//!
//! # Key Types
//! - [`ClassFile`] - A parsed class: hierarchy, pool, fields, methods
//! - [`Method`] / [`Field`] - Declared members with their structural shape
//! - [`MethodDesc`] / [`ParamKind`] / [`ReturnKind`] - Structural signatures
//! - [`ConstantPool`] / [`PoolEntry`] - Shared constants and member references
//! - [`ExceptionEntry`] - One handler range of a method's exception table
//!
//! Member *names* in this format carry no meaning - the host build pins them
//! arbitrarily per release - so everything downstream matches on name strings
//! pinned per host version plus structural shape, never on semantics.

pub(crate) mod io;

mod descriptor;
mod file;
mod pool;

pub use descriptor::{MethodDesc, ParamKind, ReturnKind};
pub use file::{
    ClassFile, ClassFlags, ExceptionEntry, Field, MemberFlags, Method, CLASS_MAGIC, CLASS_VERSION,
};
pub use pool::{ConstantPool, MemberRefData, PoolEntry};
