//! The base entity wrapper.

use std::sync::Arc;

use uuid::Uuid;

use crate::adapter::{
    invoke, read_field, value_or, ClassCategory, LivingRef, Location, LogicalOp, PlayerRef,
    ProjectileRef, TameableRef, WorldRef,
};
use crate::context::GraftContext;
use crate::host::{HostRef, HostValue};

/// Any host entity, wrapped.
///
/// Created fresh per access; carries the classification of its concrete
/// class and offers checked casts down to the more specific wrappers.
#[derive(Clone)]
pub struct EntityRef {
    pub(crate) ctx: Arc<GraftContext>,
    pub(crate) host: HostRef,
    category: ClassCategory,
}

impl EntityRef {
    /// Wraps a host entity, classifying its concrete class.
    pub fn new(ctx: Arc<GraftContext>, host: HostRef) -> EntityRef {
        let category = ctx.classifier().classify(&host.class());
        EntityRef {
            ctx,
            host,
            category,
        }
    }

    /// The API variant this entity's concrete class maps to.
    pub fn category(&self) -> ClassCategory {
        self.category
    }

    /// The underlying host object.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Stable identity. Defaults to the nil id when unreadable.
    pub fn unique_id(&self) -> Uuid {
        value_or(
            LogicalOp::EntityUuid,
            invoke(&self.ctx, &self.host, LogicalOp::EntityUuid, &[]).map(|v| v.as_uuid()),
            Uuid::nil(),
        )
    }

    /// Whether the host still considers this entity live. Defaults to `true`.
    pub fn is_valid(&self) -> bool {
        value_or(
            LogicalOp::IsAlive,
            invoke(&self.ctx, &self.host, LogicalOp::IsAlive, &[]).map(|v| v.as_bool()),
            true,
        )
    }

    /// Position and view angles. `None` when the position is unreadable.
    pub fn location(&self) -> Option<Location> {
        let position = invoke(&self.ctx, &self.host, LogicalOp::Position, &[]).ok()?;
        let position = position.as_object()?;
        let x = read_field(&self.ctx, position, LogicalOp::VecX).ok()?.as_f64()?;
        let y = read_field(&self.ctx, position, LogicalOp::VecY).ok()?.as_f64()?;
        let z = read_field(&self.ctx, position, LogicalOp::VecZ).ok()?.as_f64()?;

        #[allow(clippy::cast_possible_truncation)]
        let yaw = value_or(
            LogicalOp::Yaw,
            invoke(&self.ctx, &self.host, LogicalOp::Yaw, &[]).map(|v| v.as_f64()),
            0.0,
        ) as f32;
        #[allow(clippy::cast_possible_truncation)]
        let pitch = value_or(
            LogicalOp::Pitch,
            invoke(&self.ctx, &self.host, LogicalOp::Pitch, &[]).map(|v| v.as_f64()),
            0.0,
        ) as f32;

        let world = self.world().map(|w| w.name()).filter(|n| !n.is_empty());
        Some(Location {
            world,
            x,
            y,
            z,
            yaw,
            pitch,
        })
    }

    /// The world this entity lives in. `None` when unreadable.
    pub fn world(&self) -> Option<WorldRef> {
        let world = invoke(&self.ctx, &self.host, LogicalOp::EntityWorld, &[]).ok()?;
        let world = world.as_object()?;
        Some(WorldRef::new(self.ctx.clone(), world.clone()))
    }

    /// Moves the entity. Best-effort; a failed move leaves it in place.
    pub fn teleport(&self, to: &Location) {
        let args = [
            HostValue::F64(to.x),
            HostValue::F64(to.y),
            HostValue::F64(to.z),
            HostValue::F32(to.yaw),
            HostValue::F32(to.pitch),
        ];
        value_or(
            LogicalOp::MoveTo,
            invoke(&self.ctx, &self.host, LogicalOp::MoveTo, &args).map(|_| Some(())),
            (),
        );
    }

    /// Removes the entity from the world. Best-effort.
    pub fn remove(&self) {
        value_or(
            LogicalOp::Discard,
            invoke(&self.ctx, &self.host, LogicalOp::Discard, &[]).map(|_| Some(())),
            (),
        );
    }

    /// Whether a metadata tag is present under `key`.
    pub fn has_metadata(&self, key: &str) -> bool {
        self.ctx.metadata().has(self.unique_id(), key)
    }

    /// Sets a metadata tag, keyed by this entity's stable identity.
    pub fn set_metadata(&self, key: &str, value: HostValue) {
        self.ctx.metadata().set(self.unique_id(), key, value);
    }

    /// Reads a metadata tag.
    pub fn metadata(&self, key: &str) -> Option<HostValue> {
        self.ctx.metadata().get(self.unique_id(), key)
    }

    /// Removes a metadata tag.
    pub fn remove_metadata(&self, key: &str) {
        self.ctx.metadata().remove(self.unique_id(), key);
    }

    /// Downcast to a living entity, when classification allows it.
    pub fn as_living(&self) -> Option<LivingRef> {
        match self.category {
            ClassCategory::Living | ClassCategory::Player | ClassCategory::Tameable => {
                Some(LivingRef::from_entity(self.clone()))
            }
            _ => None,
        }
    }

    /// Downcast to a tameable animal.
    pub fn as_tameable(&self) -> Option<TameableRef> {
        match self.category {
            ClassCategory::Tameable => Some(TameableRef::from_entity(self.clone())),
            _ => None,
        }
    }

    /// Downcast to a projectile.
    pub fn as_projectile(&self) -> Option<ProjectileRef> {
        match self.category {
            ClassCategory::Projectile => Some(ProjectileRef::from_entity(self.clone())),
            _ => None,
        }
    }

    /// Downcast to a player.
    pub fn as_player(&self) -> Option<PlayerRef> {
        match self.category {
            ClassCategory::Player => Some(PlayerRef::from_entity(self.clone())),
            _ => None,
        }
    }
}
