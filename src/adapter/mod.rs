//! The reflective adapter layer: the public API over opaque host objects.
//!
//! Every operation here - health, position, slot access, teleports - is
//! implemented purely by structural lookup against the live host object:
//! the [`MemberLocator`] binds a [`LogicalOp`] to an unnamed member once per
//! concrete class, the [`ClassificationCache`] decides which API variant an
//! instance belongs to, and thin wrapper types carry out the calls.
//!
//! # Default-on-failure
//!
//! No accessor ever surfaces an error. When the pinned signature has drifted
//! ([`StructuralMismatch`](crate::Error::StructuralMismatch)) or a located
//! member misbehaves ([`InvocationFailure`](crate::Error::InvocationFailure)),
//! the operation returns its documented default: health reads as the fixed
//! maximum `20.0`, collections come back empty, strings empty, optional
//! structures `None`, and mutations become no-ops. Failures are logged at
//! `debug` - the host keeps running either way.
//!
//! Wrappers are created fresh per access and are cheap clones of shared
//! pointers; identity-keyed state (metadata tags) lives in the
//! [`MetadataStore`], keyed by the host-stable entity id.

mod classify;
mod entity;
mod inventory;
mod living;
mod locator;
mod metadata;
mod player;
mod profile;
mod server;
mod world;

use std::sync::Arc;

use crate::context::GraftContext;
use crate::host::{HostRef, HostValue};
use crate::{Error, Result};

pub use classify::{ClassCategory, ClassificationCache};
pub use entity::EntityRef;
pub use inventory::{InventoryRef, ItemRef};
pub use living::{LivingRef, ProjectileRef, TameableRef};
pub use locator::MemberLocator;
pub use metadata::MetadataStore;
pub use player::PlayerRef;
pub use profile::{HostProfile, LogicalOp, MemberSpec, RetShape};
pub use server::ServerRef;
pub use world::{BlockRef, WorldRef};

/// A point in a world, with view angles.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Name of the containing world, when known
    pub world: Option<String>,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Horizontal view angle
    pub yaw: f32,
    /// Vertical view angle
    pub pitch: f32,
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Z coordinate
    pub z: i32,
}

/// Wraps any host entity object in the most informative wrapper available.
///
/// Classification decides the [`ClassCategory`]; the returned [`EntityRef`]
/// exposes it and offers checked casts to the more specific wrappers.
pub fn wrap_entity(ctx: Arc<GraftContext>, host: HostRef) -> EntityRef {
    EntityRef::new(ctx, host)
}

/// Invokes a method-pinned logical operation.
pub(crate) fn invoke(
    ctx: &GraftContext,
    host: &HostRef,
    op: LogicalOp,
    args: &[HostValue],
) -> Result<HostValue> {
    let handle = resolve(ctx, host, op)?;
    host.call(&handle, args)
}

/// Reads a field-pinned logical operation.
pub(crate) fn read_field(ctx: &GraftContext, host: &HostRef, op: LogicalOp) -> Result<HostValue> {
    let handle = resolve(ctx, host, op)?;
    host.get(&handle)
}

/// Writes a field-pinned logical operation.
pub(crate) fn write_field(
    ctx: &GraftContext,
    host: &HostRef,
    op: LogicalOp,
    value: HostValue,
) -> Result<()> {
    let handle = resolve(ctx, host, op)?;
    host.set(&handle, value)
}

fn resolve(
    ctx: &GraftContext,
    host: &HostRef,
    op: LogicalOp,
) -> Result<crate::host::MemberHandle> {
    let class = host.class();
    ctx.locator()
        .resolve(&class, op)
        .ok_or_else(|| Error::StructuralMismatch {
            class: class.name().to_string(),
            operation: op.to_string(),
        })
}

/// Collapses an operation outcome to its documented default, logging the
/// failure shape on the way.
pub(crate) fn value_or<T>(op: LogicalOp, outcome: Result<Option<T>>, default: T) -> T {
    match outcome {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::debug!(operation = %op, "host member returned an unusable shape");
            default
        }
        Err(err) => {
            tracing::debug!(operation = %op, error = %err, "adapter operation fell back to default");
            default
        }
    }
}
