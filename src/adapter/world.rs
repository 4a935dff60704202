//! World and block wrappers.

use std::sync::Arc;

use crate::adapter::{invoke, value_or, BlockPos, LogicalOp};
use crate::context::GraftContext;
use crate::host::{HostRef, HostValue};

/// A world the host is simulating.
#[derive(Clone)]
pub struct WorldRef {
    pub(crate) ctx: Arc<GraftContext>,
    pub(crate) host: HostRef,
}

impl WorldRef {
    /// Wraps a host world object.
    pub fn new(ctx: Arc<GraftContext>, host: HostRef) -> WorldRef {
        WorldRef { ctx, host }
    }

    /// The underlying host object.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// World name. Defaults to the empty string.
    pub fn name(&self) -> String {
        value_or(
            LogicalOp::WorldName,
            invoke(&self.ctx, &self.host, LogicalOp::WorldName, &[])
                .map(|v| v.as_str().map(ToString::to_string)),
            String::new(),
        )
    }

    /// World clock. Defaults to `0`.
    pub fn time(&self) -> i64 {
        value_or(
            LogicalOp::WorldTime,
            invoke(&self.ctx, &self.host, LogicalOp::WorldTime, &[]).map(|v| v.as_i64()),
            0,
        )
    }

    /// The block at the given coordinates.
    ///
    /// Always constructs - a block wrapper is coordinates plus a world, and
    /// its accessors apply the default-on-failure policy individually.
    pub fn block_at(&self, pos: BlockPos) -> BlockRef {
        BlockRef {
            world: self.clone(),
            pos,
        }
    }
}

/// One block position within a world.
#[derive(Clone)]
pub struct BlockRef {
    world: WorldRef,
    pos: BlockPos,
}

impl BlockRef {
    /// The block's coordinates.
    pub fn position(&self) -> BlockPos {
        self.pos
    }

    /// The containing world.
    pub fn world(&self) -> &WorldRef {
        &self.world
    }

    /// Block kind name. Defaults to the empty string.
    pub fn kind(&self) -> String {
        let args = [
            HostValue::I32(self.pos.x),
            HostValue::I32(self.pos.y),
            HostValue::I32(self.pos.z),
        ];
        value_or(
            LogicalOp::BlockKindAt,
            invoke(&self.world.ctx, &self.world.host, LogicalOp::BlockKindAt, &args)
                .map(|v| v.as_str().map(ToString::to_string)),
            String::new(),
        )
    }

    /// Replaces the block kind. Returns whether the host accepted the
    /// change; defaults to `false`.
    pub fn set_kind(&self, kind: &str) -> bool {
        let args = [
            HostValue::I32(self.pos.x),
            HostValue::I32(self.pos.y),
            HostValue::I32(self.pos.z),
            HostValue::Str(kind.to_string()),
        ];
        value_or(
            LogicalOp::SetBlockKindAt,
            invoke(&self.world.ctx, &self.world.host, LogicalOp::SetBlockKindAt, &args)
                .map(|v| v.as_bool()),
            false,
        )
    }
}
