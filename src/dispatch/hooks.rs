//! The dispatch entry points injected code calls.
//!
//! Each method here is the target of exactly one kind of injected call site,
//! and its signature mirrors what that site can actually pass: the receiver
//! the rewritten method ran on, its primary argument, and nothing richer -
//! rewritten code has no visibility into adapter types. Unpacking (the
//! player behind a packet handler, the coordinates inside a movement
//! message) happens here, through the same pinned member bindings the
//! adapter layer uses.
//!
//! The boolean answers mean "cancel the original operation"; hooks wired to
//! observation-only sites always answer `false`.
//!
//! Every body runs under blanket recovery: errors and panics alike collapse
//! to the hook's default answer, which is always the one that leaves the
//! host's original behavior untouched.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::adapter::{
    invoke, read_field, wrap_entity, write_field, BlockPos, BlockRef, Location, LogicalOp,
    PlayerRef,
};
use crate::context::GraftContext;
use crate::dispatch::Event;
use crate::handshake::{extract_marker, JoinDecision};
use crate::host::{HostRef, HostValue};
use crate::{Error, Result};

/// The fixed set of entry points callable from rewritten host code.
#[derive(Clone)]
pub struct HookDispatch {
    ctx: Arc<GraftContext>,
}

impl HookDispatch {
    /// Creates the dispatch surface over a context.
    pub fn new(ctx: Arc<GraftContext>) -> HookDispatch {
        HookDispatch { ctx }
    }

    /// The context this dispatch answers from.
    pub fn context(&self) -> &Arc<GraftContext> {
        &self.ctx
    }

    /// Blanket recovery around a hook body: an `Err` or a panic becomes the
    /// default answer, logged, never propagated into the host's call stack.
    fn guard<T>(&self, entry: &'static str, default: T, body: impl FnOnce() -> Result<T>) -> T {
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                tracing::warn!(hook = entry, error = %err, "hook failed; treating as no interception");
                default
            }
            Err(_) => {
                tracing::warn!(hook = entry, "hook panicked; treating as no interception");
                default
            }
        }
    }

    // =================== Cancellable gameplay hooks ===================

    /// A chat message reached its handler. `true` cancels the chat.
    pub fn player_chat(&self, handler: &HostRef, packet: &HostRef) -> bool {
        self.guard("player_chat", false, || {
            let player = self.handler_player(handler)?;
            let message = read_field(&self.ctx, packet, LogicalOp::ChatText)?;
            let message = message.as_str().unwrap_or_default().to_string();
            Ok(self.ctx.bus().fire(Event::PlayerChat { player, message }))
        })
    }

    /// A command line reached its handler. Fires the event, then offers the
    /// line to the registered command registry. `true` suppresses the
    /// host's own command handling.
    pub fn player_command(&self, handler: &HostRef, command: &str) -> bool {
        self.guard("player_command", false, || {
            let player = self.handler_player(handler)?;
            let line = command.strip_prefix('/').unwrap_or(command);
            let cancelled = self.ctx.bus().fire(Event::PlayerCommand {
                player: player.clone(),
                command: format!("/{line}"),
            });
            if cancelled {
                return Ok(true);
            }

            let Some(registry) = self.ctx.command_registry() else {
                return Ok(false);
            };
            let mut parts = line.split_whitespace();
            let Some(name) = parts.next() else {
                return Ok(false);
            };
            let args: Vec<&str> = parts.collect();
            Ok(registry.dispatch(&player, name, &args))
        })
    }

    /// A movement message reached its handler. `true` cancels the move.
    pub fn player_move(&self, handler: &HostRef, packet: &HostRef) -> bool {
        self.guard("player_move", false, || {
            let player = self.handler_player(handler)?;
            let read = |op: LogicalOp| -> Result<f64> {
                read_field(&self.ctx, packet, op)?
                    .as_f64()
                    .ok_or_else(|| shape_error(packet, op, "coordinate field held a non-number"))
            };
            let to = Location {
                world: None,
                x: read(LogicalOp::MoveX)?,
                y: read(LogicalOp::MoveY)?,
                z: read(LogicalOp::MoveZ)?,
                yaw: 0.0,
                pitch: 0.0,
            };
            Ok(self.ctx.bus().fire(Event::PlayerMove { player, to }))
        })
    }

    /// A block is being destroyed. The receiver is the game-mode
    /// controller; the player is unpacked from its pinned field. `true`
    /// cancels the break.
    pub fn block_break(&self, game_mode: &HostRef, block_pos: &HostRef) -> bool {
        self.guard("block_break", false, || {
            let player = self.unpack_player(game_mode, LogicalOp::GameModePlayer)?;
            let block = self.block_from(&player, block_pos)?;
            Ok(self.ctx.bus().fire(Event::BlockBreak { player, block }))
        })
    }

    /// An item is being used against a block. `true` cancels the placement.
    pub fn block_place(&self, handler: &HostRef, packet: &HostRef) -> bool {
        self.guard("block_place", false, || {
            let player = self.handler_player(handler)?;
            let pos = invoke(&self.ctx, packet, LogicalOp::PacketBlockPos, &[])?;
            let pos = pos
                .as_object()
                .ok_or_else(|| shape_error(packet, LogicalOp::PacketBlockPos, "non-object"))?
                .clone();
            let block = self.block_from(&player, &pos)?;
            let item = player.held_item();
            Ok(self.ctx.bus().fire(Event::BlockPlace {
                player,
                block,
                item,
            }))
        })
    }

    /// A player is attacking an entity named by an interaction message.
    /// `true` cancels the damage. The damage amount is not knowable at this
    /// point; listeners see a nominal `1.0`.
    pub fn entity_damage(&self, handler: &HostRef, packet: &HostRef) -> bool {
        self.guard("entity_damage", false, || {
            let attacker = self.handler_player(handler)?;
            let victim = invoke(&self.ctx, packet, LogicalOp::PacketTarget, &[])?;
            let victim = victim
                .as_object()
                .ok_or_else(|| shape_error(packet, LogicalOp::PacketTarget, "non-object"))?;
            let victim = wrap_entity(self.ctx.clone(), victim.clone());
            let attacker = wrap_entity(self.ctx.clone(), attacker.host().clone());
            Ok(self.ctx.bus().fire(Event::EntityDamageByEntity {
                attacker,
                victim,
                amount: 1.0,
            }))
        })
    }

    // =================== Observation hooks ===================

    /// A player is being removed from the player list. Never cancels.
    pub fn player_quit(&self, _list: &HostRef, player: &HostRef) -> bool {
        self.guard("player_quit", false, || {
            let player = self.as_player(player)?;
            self.ctx.bus().fire(Event::PlayerQuit { player });
            Ok(false)
        })
    }

    /// A player closed a container. Never cancels.
    pub fn container_close(&self, handler: &HostRef, _packet: &HostRef) -> bool {
        self.guard("container_close", false, || {
            let player = self.handler_player(handler)?;
            self.ctx.bus().fire(Event::ContainerClose { player });
            Ok(false)
        })
    }

    /// A player finished joining (pre-return site on the player itself).
    pub fn player_join(&self, player: &HostRef) {
        self.guard("player_join", (), || {
            let player = self.as_player(player)?;
            self.ctx.bus().fire(Event::PlayerJoin { player });
            Ok(())
        });
    }

    /// A player respawned (pre-return site).
    pub fn player_respawn(&self, player: &HostRef) {
        self.guard("player_respawn", (), || {
            let player = self.as_player(player)?;
            self.ctx.bus().fire(Event::PlayerRespawn { player });
            Ok(())
        });
    }

    /// A living entity is dying (pre-return site).
    pub fn entity_death(&self, entity: &HostRef) {
        self.guard("entity_death", (), || {
            let entity = wrap_entity(self.ctx.clone(), entity.clone());
            self.ctx.bus().fire(Event::EntityDeath { entity });
            Ok(())
        });
    }

    /// An entity landed a teleport (pre-return site on the move method).
    /// Fires only for players; other entities move too often to observe.
    pub fn entity_teleport(&self, entity: &HostRef) {
        self.guard("entity_teleport", (), || {
            let entity = wrap_entity(self.ctx.clone(), entity.clone());
            if let Some(player) = entity.as_player() {
                let to = player.location();
                self.ctx.bus().fire(Event::PlayerTeleport { player, to });
            }
            Ok(())
        });
    }

    // =================== Lifecycle hooks ===================

    /// The server object reached its run loop. Captures it once; later
    /// observations are ignored. Never cancels.
    pub fn server_ready(&self, server: &HostRef) -> bool {
        self.guard("server_ready", false, || {
            if self.ctx.capture_server(server.clone()) {
                tracing::info!("host server captured; server adapter active");
            }
            Ok(false)
        })
    }

    /// Full-replace target: supplies the status brand string in place of
    /// the host's own builder.
    pub fn server_brand(&self, _responder: &HostRef) -> String {
        self.guard("server_brand", String::new(), || {
            Ok(format!("hostgraft {}", env!("CARGO_PKG_VERSION")))
        })
    }

    // =================== Handshake hooks ===================

    /// The connection-establishment message reached its handler. Parses and
    /// strips the compatibility marker from the address field,
    /// transitioning the connection to `Verified` when present. Never
    /// cancels - enforcement happens at join time.
    pub fn handshake_received(&self, handler: &HostRef, packet: &HostRef) -> bool {
        self.guard("handshake_received", false, || {
            let connection = read_field(&self.ctx, handler, LogicalOp::HandlerConnection)?;
            let connection = connection
                .as_object()
                .ok_or_else(|| shape_error(handler, LogicalOp::HandlerConnection, "non-object"))?;
            let key = self.connection_key(connection)?;

            let field = read_field(&self.ctx, packet, LogicalOp::HandshakeAddress)?;
            let Some(field) = field.as_str() else {
                return Ok(false);
            };

            if let Some(payload) = extract_marker(field) {
                write_field(
                    &self.ctx,
                    packet,
                    LogicalOp::HandshakeAddress,
                    HostValue::Str(payload.address.clone()),
                )?;
                tracing::debug!(
                    connection = %key,
                    version = %payload.version,
                    protocol = payload.protocol,
                    "handshake marker verified"
                );
                self.ctx.handshake().verify(&key, &payload);
            }
            Ok(false)
        })
    }

    /// Join-time safety net (guarded call-out at the head of the
    /// place-new-player path; the primary argument is the connection).
    /// `true` means the join was rejected and the connection told why.
    pub fn verify_on_join(&self, _list: &HostRef, connection: &HostRef) -> bool {
        self.guard("verify_on_join", false, || {
            let key = self.connection_key(connection)?;
            match self.ctx.handshake().resolve(&key) {
                JoinDecision::Accept => Ok(false),
                JoinDecision::Reject(message) => {
                    tracing::info!(connection = %key, %message, "join rejected");
                    let args = [HostValue::Str(message)];
                    if let Err(err) = invoke(&self.ctx, connection, LogicalOp::ConnDisconnect, &args)
                    {
                        tracing::warn!(error = %err, "could not deliver disconnect message");
                    }
                    Ok(true)
                }
            }
        })
    }

    // =================== Receiver unpacking ===================

    fn as_player(&self, host: &HostRef) -> Result<PlayerRef> {
        wrap_entity(self.ctx.clone(), host.clone())
            .as_player()
            .ok_or_else(|| Error::InvocationFailure {
                class: host.class().name().to_string(),
                operation: "wrap_player".to_string(),
                message: "receiver does not classify as a player".to_string(),
            })
    }

    fn handler_player(&self, handler: &HostRef) -> Result<PlayerRef> {
        self.unpack_player(handler, LogicalOp::HandlerPlayer)
    }

    fn unpack_player(&self, owner: &HostRef, op: LogicalOp) -> Result<PlayerRef> {
        let player = read_field(&self.ctx, owner, op)?;
        let player = player
            .as_object()
            .ok_or_else(|| shape_error(owner, op, "player field held a non-object"))?;
        self.as_player(player)
    }

    fn connection_key(&self, connection: &HostRef) -> Result<String> {
        let address = read_field(&self.ctx, connection, LogicalOp::RemoteAddress)?;
        address
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                shape_error(connection, LogicalOp::RemoteAddress, "address field held a non-string")
            })
    }

    fn block_from(&self, player: &PlayerRef, block_pos: &HostRef) -> Result<BlockRef> {
        let read = |op: LogicalOp| -> Result<i32> {
            let value = invoke(&self.ctx, block_pos, op, &[])?;
            value
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| shape_error(block_pos, op, "coordinate accessor returned a non-integer"))
        };
        let pos = BlockPos {
            x: read(LogicalOp::PosX)?,
            y: read(LogicalOp::PosY)?,
            z: read(LogicalOp::PosZ)?,
        };
        let world = player.world().ok_or_else(|| Error::InvocationFailure {
            class: block_pos.class().name().to_string(),
            operation: "entity_world".to_string(),
            message: "player has no readable world".to_string(),
        })?;
        Ok(world.block_at(pos))
    }
}

fn shape_error(host: &HostRef, op: LogicalOp, message: &str) -> Error {
    Error::InvocationFailure {
        class: host.class().name().to_string(),
        operation: op.to_string(),
        message: message.to_string(),
    }
}
