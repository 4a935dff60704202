//! The server wrapper.

use std::sync::Arc;

use crate::adapter::{invoke, value_or, wrap_entity, LogicalOp, PlayerRef};
use crate::context::GraftContext;
use crate::host::{HostRef, HostValue};

/// The host server itself, once captured.
#[derive(Clone)]
pub struct ServerRef {
    ctx: Arc<GraftContext>,
    host: HostRef,
}

impl ServerRef {
    pub(crate) fn new(ctx: Arc<GraftContext>, host: HostRef) -> ServerRef {
        ServerRef { ctx, host }
    }

    /// The underlying host object.
    pub fn host(&self) -> &HostRef {
        &self.host
    }

    /// Host build version string. Defaults to the empty string.
    pub fn version(&self) -> String {
        value_or(
            LogicalOp::ServerVersion,
            invoke(&self.ctx, &self.host, LogicalOp::ServerVersion, &[])
                .map(|v| v.as_str().map(ToString::to_string)),
            String::new(),
        )
    }

    /// Currently connected players. Defaults to the empty list; entries the
    /// classifier does not recognize as players are dropped.
    pub fn online_players(&self) -> Vec<PlayerRef> {
        let outcome = invoke(&self.ctx, &self.host, LogicalOp::OnlinePlayers, &[]).map(|value| {
            value.as_list().map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_object())
                    .filter_map(|host| {
                        wrap_entity(self.ctx.clone(), host.clone()).as_player()
                    })
                    .collect::<Vec<_>>()
            })
        });
        value_or(LogicalOp::OnlinePlayers, outcome, Vec::new())
    }

    /// Sends a chat line to every connected player. Best-effort.
    pub fn broadcast(&self, message: &str) {
        let args = [HostValue::Str(message.to_string())];
        value_or(
            LogicalOp::Broadcast,
            invoke(&self.ctx, &self.host, LogicalOp::Broadcast, &args).map(|_| Some(())),
            (),
        );
    }
}
