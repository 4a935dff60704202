//! Inventory and item wrappers.

use std::sync::Arc;

use crate::adapter::{invoke, value_or, LogicalOp};
use crate::context::GraftContext;
use crate::host::{HostRef, HostValue};

/// A slot-addressed container.
#[derive(Clone)]
pub struct InventoryRef {
    ctx: Arc<GraftContext>,
    host: HostRef,
}

impl InventoryRef {
    /// Wraps a host inventory object.
    pub fn new(ctx: Arc<GraftContext>, host: HostRef) -> InventoryRef {
        InventoryRef { ctx, host }
    }

    /// Slot count. Defaults to `0`, which also makes every slot read `None`.
    pub fn size(&self) -> i32 {
        value_or(
            LogicalOp::InvSize,
            invoke(&self.ctx, &self.host, LogicalOp::InvSize, &[])
                .map(|v| v.as_i64().and_then(|n| i32::try_from(n).ok())),
            0,
        )
    }

    /// The item in `slot`, when present and readable.
    pub fn item(&self, slot: i32) -> Option<ItemRef> {
        let args = [HostValue::I32(slot)];
        let item = invoke(&self.ctx, &self.host, LogicalOp::InvSlot, &args).ok()?;
        let item = item.as_object()?;
        Some(ItemRef::new(self.ctx.clone(), item.clone()))
    }

    /// Replaces the item in `slot`. Best-effort.
    pub fn set_item(&self, slot: i32, item: &ItemRef) {
        let args = [HostValue::I32(slot), HostValue::Object(item.host.clone())];
        value_or(
            LogicalOp::SetInvSlot,
            invoke(&self.ctx, &self.host, LogicalOp::SetInvSlot, &args).map(|_| Some(())),
            (),
        );
    }

    /// Empties the container. Best-effort.
    pub fn clear(&self) {
        value_or(
            LogicalOp::ClearInv,
            invoke(&self.ctx, &self.host, LogicalOp::ClearInv, &[]).map(|_| Some(())),
            (),
        );
    }
}

/// A stack of items.
#[derive(Clone)]
pub struct ItemRef {
    ctx: Arc<GraftContext>,
    pub(crate) host: HostRef,
}

impl ItemRef {
    /// Wraps a host item object.
    pub fn new(ctx: Arc<GraftContext>, host: HostRef) -> ItemRef {
        ItemRef { ctx, host }
    }

    /// The underlying host object.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Kind name. Defaults to the empty string.
    pub fn kind(&self) -> String {
        value_or(
            LogicalOp::ItemKind,
            invoke(&self.ctx, &self.host, LogicalOp::ItemKind, &[])
                .map(|v| v.as_str().map(ToString::to_string)),
            String::new(),
        )
    }

    /// Stack count. Defaults to `0`.
    pub fn count(&self) -> i32 {
        value_or(
            LogicalOp::ItemCount,
            invoke(&self.ctx, &self.host, LogicalOp::ItemCount, &[])
                .map(|v| v.as_i64().and_then(|n| i32::try_from(n).ok())),
            0,
        )
    }

    /// Writes the stack count. Best-effort.
    pub fn set_count(&self, count: i32) {
        let args = [HostValue::I32(count)];
        value_or(
            LogicalOp::SetItemCount,
            invoke(&self.ctx, &self.host, LogicalOp::SetItemCount, &args).map(|_| Some(())),
            (),
        );
    }
}
