//! The player wrapper.

use std::ops::Deref;

use crate::adapter::{invoke, value_or, EntityRef, InventoryRef, ItemRef, LivingRef, LogicalOp};
use crate::host::HostValue;

/// A connected player.
#[derive(Clone)]
pub struct PlayerRef {
    living: LivingRef,
}

impl Deref for PlayerRef {
    type Target = LivingRef;

    fn deref(&self) -> &LivingRef {
        &self.living
    }
}

impl PlayerRef {
    pub(crate) fn from_entity(entity: EntityRef) -> PlayerRef {
        PlayerRef {
            living: LivingRef::from_entity(entity),
        }
    }

    /// Display name. Defaults to the empty string.
    pub fn name(&self) -> String {
        value_or(
            LogicalOp::PlayerName,
            invoke(&self.ctx, &self.host, LogicalOp::PlayerName, &[])
                .map(|v| v.as_str().map(ToString::to_string)),
            String::new(),
        )
    }

    /// Sends a chat line. Best-effort.
    pub fn send_message(&self, message: &str) {
        let args = [HostValue::Str(message.to_string())];
        value_or(
            LogicalOp::SendMessage,
            invoke(&self.ctx, &self.host, LogicalOp::SendMessage, &args).map(|_| Some(())),
            (),
        );
    }

    /// Disconnects the player with a user-visible reason. Best-effort.
    pub fn disconnect(&self, reason: &str) {
        let args = [HostValue::Str(reason.to_string())];
        value_or(
            LogicalOp::Disconnect,
            invoke(&self.ctx, &self.host, LogicalOp::Disconnect, &args).map(|_| Some(())),
            (),
        );
    }

    /// The item currently held, when readable and present.
    pub fn held_item(&self) -> Option<ItemRef> {
        let item = invoke(&self.ctx, &self.host, LogicalOp::HeldItem, &[]).ok()?;
        let item = item.as_object()?;
        Some(ItemRef::new(self.ctx.clone(), item.clone()))
    }

    /// The player's inventory, when readable.
    pub fn inventory(&self) -> Option<InventoryRef> {
        let inventory = invoke(&self.ctx, &self.host, LogicalOp::PlayerInventory, &[]).ok()?;
        let inventory = inventory.as_object()?;
        Some(InventoryRef::new(self.ctx.clone(), inventory.clone()))
    }

    /// Consults the registered permission provider. Without a provider, or
    /// when the player's identity is unreadable, the answer is `false`.
    pub fn has_permission(&self, node: &str) -> bool {
        match self.ctx.permission_provider() {
            Some(provider) => provider.has_permission(self.unique_id(), node),
            None => false,
        }
    }
}
