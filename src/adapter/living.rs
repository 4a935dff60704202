//! Living, tameable, and projectile wrappers.

use std::ops::Deref;

use uuid::Uuid;

use crate::adapter::{invoke, value_or, EntityRef, LogicalOp};
use crate::host::HostValue;

/// A living entity: anything with health.
#[derive(Clone)]
pub struct LivingRef {
    entity: EntityRef,
}

impl Deref for LivingRef {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.entity
    }
}

impl LivingRef {
    pub(crate) fn from_entity(entity: EntityRef) -> LivingRef {
        LivingRef { entity }
    }

    /// Current health. Defaults to the fixed maximum `20.0`.
    pub fn health(&self) -> f64 {
        value_or(
            LogicalOp::Health,
            invoke(&self.ctx, &self.host, LogicalOp::Health, &[]).map(|v| v.as_f64()),
            20.0,
        )
    }

    /// Health ceiling. Defaults to `20.0`.
    pub fn max_health(&self) -> f64 {
        value_or(
            LogicalOp::MaxHealth,
            invoke(&self.ctx, &self.host, LogicalOp::MaxHealth, &[]).map(|v| v.as_f64()),
            20.0,
        )
    }

    /// Writes health directly. Best-effort.
    pub fn set_health(&self, health: f64) {
        #[allow(clippy::cast_possible_truncation)]
        let args = [HostValue::F32(health as f32)];
        value_or(
            LogicalOp::SetHealth,
            invoke(&self.ctx, &self.host, LogicalOp::SetHealth, &args).map(|_| Some(())),
            (),
        );
    }

    /// Applies damage. Returns whether the host accepted the hit;
    /// defaults to `false`.
    pub fn damage(&self, amount: f64) -> bool {
        #[allow(clippy::cast_possible_truncation)]
        let args = [HostValue::F32(amount as f32)];
        value_or(
            LogicalOp::Hurt,
            invoke(&self.ctx, &self.host, LogicalOp::Hurt, &args).map(|v| v.as_bool()),
            false,
        )
    }

    /// Whether the entity is dead or dying. Defaults to `false`.
    pub fn is_dead(&self) -> bool {
        value_or(
            LogicalOp::IsDeadOrDying,
            invoke(&self.ctx, &self.host, LogicalOp::IsDeadOrDying, &[]).map(|v| v.as_bool()),
            false,
        )
    }
}

/// A tameable animal.
#[derive(Clone)]
pub struct TameableRef {
    living: LivingRef,
}

impl Deref for TameableRef {
    type Target = LivingRef;

    fn deref(&self) -> &LivingRef {
        &self.living
    }
}

impl TameableRef {
    pub(crate) fn from_entity(entity: EntityRef) -> TameableRef {
        TameableRef {
            living: LivingRef::from_entity(entity),
        }
    }

    /// Whether the animal has been tamed. Defaults to `false`.
    pub fn is_tamed(&self) -> bool {
        value_or(
            LogicalOp::IsTamed,
            invoke(&self.ctx, &self.host, LogicalOp::IsTamed, &[]).map(|v| v.as_bool()),
            false,
        )
    }

    /// Identity of the owner, when tamed and readable.
    pub fn owner_id(&self) -> Option<Uuid> {
        invoke(&self.ctx, &self.host, LogicalOp::OwnerId, &[])
            .ok()
            .and_then(|v| v.as_uuid())
    }
}

/// A projectile in flight.
#[derive(Clone)]
pub struct ProjectileRef {
    entity: EntityRef,
}

impl Deref for ProjectileRef {
    type Target = EntityRef;

    fn deref(&self) -> &EntityRef {
        &self.entity
    }
}

impl ProjectileRef {
    pub(crate) fn from_entity(entity: EntityRef) -> ProjectileRef {
        ProjectileRef { entity }
    }

    /// The entity that launched this projectile, when readable.
    pub fn shooter(&self) -> Option<EntityRef> {
        let shooter = invoke(&self.ctx, &self.host, LogicalOp::Shooter, &[]).ok()?;
        let shooter = shooter.as_object()?;
        Some(EntityRef::new(self.ctx.clone(), shooter.clone()))
    }
}
