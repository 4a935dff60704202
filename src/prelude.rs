//! Convenient re-exports of the most commonly used types and traits.
//!
//! This module provides a curated selection of the most frequently used
//! types from across the library, allowing for convenient glob imports.
//!
//! # Example
//!
//! ```rust
//! use hostgraft::prelude::*;
//!
//! let ctx = GraftContext::new(HostProfile::pinned(), HandshakeTable::new(true, "0.1.0"));
//! let agent = GraftAgent::install(ctx, pinned_rules());
//! assert!(!agent.linkage().is_empty());
//! ```

pub use crate::adapter::{
    wrap_entity, BlockPos, BlockRef, ClassCategory, EntityRef, HostProfile, InventoryRef, ItemRef,
    LivingRef, Location, LogicalOp, MemberSpec, PlayerRef, ProjectileRef, RetShape, ServerRef,
    TameableRef, WorldRef,
};
pub use crate::agent::{pinned_rules, GraftAgent, HookFn, LinkageTable};
pub use crate::bytecode::{verify_method, AncestorResolver, CodeEditor, Op, ValueKind};
pub use crate::class::{ClassFile, MemberFlags, Method, MethodDesc, ParamKind, ReturnKind};
pub use crate::context::GraftContext;
pub use crate::dispatch::{
    CommandRegistry, Event, EventBus, EventEnvelope, HookDispatch, PermissionProvider,
};
pub use crate::handshake::{
    embed_marker, extract_marker, HandshakeState, HandshakeTable, JoinDecision,
};
pub use crate::host::{HostClass, HostMember, HostObject, HostRef, HostValue, MemberKind};
pub use crate::transform::{
    DefaultReturn, FieldValue, MethodPattern, ParamPattern, RewriteAction, TransformEngine,
    TransformRule,
};
pub use crate::{Error, Result};
