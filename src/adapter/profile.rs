//! The per-host-version binding profile.
//!
//! Symbolic names inside the host are rewritten on every release, so nothing
//! here is discovered - every logical operation the adapter layer performs is
//! *pinned*: an opaque member name plus the structural shape that
//! disambiguates it from same-named members. The profile is the one place
//! those pins live; everything else resolves through it.

use std::collections::HashMap;
use std::sync::Arc;

use strum::Display;

use crate::adapter::classify::ClassCategory;
use crate::bytecode::ValueKind;
use crate::class::ReturnKind;
use crate::host::{HostMember, MemberKind};

/// Every operation the adapter layer knows how to perform against a host
/// object. The dispatch layer's receiver-unpacking operations live here too -
/// they are bindings to unnamed members like everything else.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum LogicalOp {
    /// Stable identity of an entity
    EntityUuid,
    /// Position record of an entity
    Position,
    /// World an entity lives in
    EntityWorld,
    /// Liveness check
    IsAlive,
    /// Removes an entity from the world
    Discard,
    /// Moves an entity to coordinates plus view angles
    MoveTo,
    /// Horizontal view angle
    Yaw,
    /// Vertical view angle
    Pitch,
    /// X component of a position record
    VecX,
    /// Y component of a position record
    VecY,
    /// Z component of a position record
    VecZ,
    /// Current health of a living entity
    Health,
    /// Health ceiling of a living entity
    MaxHealth,
    /// Writes health directly
    SetHealth,
    /// Applies damage
    Hurt,
    /// Death check
    IsDeadOrDying,
    /// Whether a tameable animal has an owner
    IsTamed,
    /// Identity of a tameable animal's owner
    OwnerId,
    /// Entity that launched a projectile
    Shooter,
    /// Display name of a player
    PlayerName,
    /// Sends a chat line to a player
    SendMessage,
    /// Disconnects a player with a message
    Disconnect,
    /// Item a player is holding
    HeldItem,
    /// A player's inventory
    PlayerInventory,
    /// Name of a world
    WorldName,
    /// Block kind at coordinates
    BlockKindAt,
    /// Replaces the block kind at coordinates
    SetBlockKindAt,
    /// World clock
    WorldTime,
    /// Slot count of an inventory
    InvSize,
    /// Item in an inventory slot
    InvSlot,
    /// Replaces an inventory slot
    SetInvSlot,
    /// Empties an inventory
    ClearInv,
    /// Kind name of an item
    ItemKind,
    /// Stack count of an item
    ItemCount,
    /// Writes an item's stack count
    SetItemCount,
    /// Host build version string
    ServerVersion,
    /// Currently connected players
    OnlinePlayers,
    /// Sends a chat line to every player
    Broadcast,
    /// Remote address of a connection
    RemoteAddress,
    /// Disconnects a connection with a message
    ConnDisconnect,
    /// Address field of the connection-establishment message
    HandshakeAddress,
    /// Connection behind a handshake handler
    HandlerConnection,
    /// Player behind a packet handler
    HandlerPlayer,
    /// Player behind a game-mode controller
    GameModePlayer,
    /// Chat line carried by a chat message
    ChatText,
    /// X carried by a movement message
    MoveX,
    /// Y carried by a movement message
    MoveY,
    /// Z carried by a movement message
    MoveZ,
    /// Block position carried by a use-item message
    PacketBlockPos,
    /// Target entity carried by an interaction message
    PacketTarget,
    /// X of a block position
    PosX,
    /// Y of a block position
    PosY,
    /// Z of a block position
    PosZ,
}

/// Expected return shape of a member, by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetShape {
    /// Returns nothing
    Void,
    /// Returns exactly this category
    Kind(ValueKind),
    /// Returns any of the four numeric categories
    Numeric,
}

/// Structural filter that selects a member for a logical operation.
///
/// Name plus shape: the name is pinned per host version, the shape is what
/// separates same-named overloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    /// Pinned member name
    pub name: String,
    /// Method or field
    pub kind: MemberKind,
    /// Expected parameter categories, in order
    pub params: Vec<ValueKind>,
    /// Expected return shape
    pub ret: RetShape,
}

impl MemberSpec {
    /// A method filter.
    pub fn method(name: &str, params: &[ValueKind], ret: RetShape) -> MemberSpec {
        MemberSpec {
            name: name.to_string(),
            kind: MemberKind::Method,
            params: params.to_vec(),
            ret,
        }
    }

    /// A field filter.
    pub fn field(name: &str, kind: ValueKind) -> MemberSpec {
        MemberSpec {
            name: name.to_string(),
            kind: MemberKind::Field,
            params: Vec::new(),
            ret: RetShape::Kind(kind),
        }
    }

    /// Whether a declared member satisfies this filter.
    pub fn matches(&self, member: &HostMember) -> bool {
        if member.kind != self.kind || member.name != self.name {
            return false;
        }
        if member.desc.params.len() != self.params.len() {
            return false;
        }
        let params_match = member
            .desc
            .params
            .iter()
            .zip(&self.params)
            .all(|(declared, expected)| ValueKind::from(declared) == *expected);
        if !params_match {
            return false;
        }
        match self.ret {
            RetShape::Void => member.desc.ret == ReturnKind::Void,
            RetShape::Numeric => member.desc.ret.is_numeric(),
            RetShape::Kind(kind) => match &member.desc.ret {
                ReturnKind::Void => false,
                ReturnKind::Value(value) => ValueKind::from(value) == kind,
            },
        }
    }
}

/// The complete pin set for one host version: logical operations to member
/// filters, plus the ordered ancestor table classification uses.
pub struct HostProfile {
    ops: HashMap<LogicalOp, MemberSpec>,
    categories: Vec<(Arc<str>, ClassCategory)>,
}

impl HostProfile {
    /// An empty profile; populate with [`HostProfile::pin`] and
    /// [`HostProfile::pin_category`].
    pub fn empty() -> HostProfile {
        HostProfile {
            ops: HashMap::new(),
            categories: Vec::new(),
        }
    }

    /// Pins a logical operation to a member filter.
    pub fn pin(mut self, op: LogicalOp, spec: MemberSpec) -> HostProfile {
        self.ops.insert(op, spec);
        self
    }

    /// Appends a classification target. Order matters: most specific first.
    pub fn pin_category(mut self, ancestor: &str, category: ClassCategory) -> HostProfile {
        self.categories.push((Arc::from(ancestor), category));
        self
    }

    /// The filter pinned for an operation, if any.
    pub fn spec(&self, op: LogicalOp) -> Option<&MemberSpec> {
        self.ops.get(&op)
    }

    /// The ordered classification targets.
    pub fn categories(&self) -> &[(Arc<str>, ClassCategory)] {
        &self.categories
    }

    /// The full pin set for the host build this crate currently targets.
    #[allow(clippy::too_many_lines)]
    pub fn pinned() -> HostProfile {
        use LogicalOp::*;
        use RetShape::{Kind, Numeric, Void};
        use ValueKind::{F32, F64, Ref, I32, I64};

        HostProfile::empty()
            // Entity ("ce")
            .pin(EntityUuid, MemberSpec::method("cY", &[], Kind(Ref)))
            .pin(Position, MemberSpec::method("dI", &[], Kind(Ref)))
            .pin(EntityWorld, MemberSpec::method("ao", &[], Kind(Ref)))
            .pin(IsAlive, MemberSpec::method("cb", &[], Kind(I32)))
            .pin(Discard, MemberSpec::method("aC", &[], Void))
            .pin(MoveTo, MemberSpec::method("b", &[F64, F64, F64, F32, F32], Void))
            .pin(Yaw, MemberSpec::method("ec", &[], Numeric))
            .pin(Pitch, MemberSpec::method("ee", &[], Numeric))
            // Position record ("dvt")
            .pin(VecX, MemberSpec::field("g", F64))
            .pin(VecY, MemberSpec::field("h", F64))
            .pin(VecZ, MemberSpec::field("i", F64))
            // Living entity ("cq")
            .pin(Health, MemberSpec::method("eZ", &[], Numeric))
            .pin(MaxHealth, MemberSpec::method("fq", &[], Numeric))
            .pin(SetHealth, MemberSpec::method("x", &[F32], Void))
            .pin(Hurt, MemberSpec::method("a", &[F32], Kind(I32)))
            .pin(IsDeadOrDying, MemberSpec::method("fa", &[], Kind(I32)))
            // Tameable animal ("cii")
            .pin(IsTamed, MemberSpec::method("gx", &[], Kind(I32)))
            .pin(OwnerId, MemberSpec::method("gy", &[], Kind(Ref)))
            // Projectile ("dec")
            .pin(Shooter, MemberSpec::method("u", &[], Kind(Ref)))
            // Player ("axg")
            .pin(PlayerName, MemberSpec::method("gI", &[], Kind(Ref)))
            .pin(SendMessage, MemberSpec::method("a", &[Ref], Void))
            .pin(Disconnect, MemberSpec::method("gJ", &[Ref], Void))
            .pin(HeldItem, MemberSpec::method("gK", &[], Kind(Ref)))
            .pin(PlayerInventory, MemberSpec::method("gL", &[], Kind(Ref)))
            // World ("bfr")
            .pin(WorldName, MemberSpec::method("D", &[], Kind(Ref)))
            .pin(BlockKindAt, MemberSpec::method("a_", &[I32, I32, I32], Kind(Ref)))
            .pin(SetBlockKindAt, MemberSpec::method("b_", &[I32, I32, I32, Ref], Kind(I32)))
            .pin(WorldTime, MemberSpec::method("Q", &[], Kind(I64)))
            // Inventory ("bcn")
            .pin(InvSize, MemberSpec::method("b", &[], Kind(I32)))
            .pin(InvSlot, MemberSpec::method("a", &[I32], Kind(Ref)))
            .pin(SetInvSlot, MemberSpec::method("a", &[I32, Ref], Void))
            .pin(ClearInv, MemberSpec::method("c", &[], Void))
            // Item ("dkj")
            .pin(ItemKind, MemberSpec::method("d", &[], Kind(Ref)))
            .pin(ItemCount, MemberSpec::method("e", &[], Kind(I32)))
            .pin(SetItemCount, MemberSpec::method("f", &[I32], Void))
            // Server ("dms")
            .pin(ServerVersion, MemberSpec::method("q", &[], Kind(Ref)))
            .pin(OnlinePlayers, MemberSpec::method("r", &[], Kind(Ref)))
            .pin(Broadcast, MemberSpec::method("s", &[Ref], Void))
            // Connection ("nw") and handshake message ("akj")
            .pin(RemoteAddress, MemberSpec::field("l", Ref))
            .pin(ConnDisconnect, MemberSpec::method("m", &[Ref], Void))
            .pin(HandshakeAddress, MemberSpec::field("c", Ref))
            .pin(HandlerConnection, MemberSpec::field("d", Ref))
            // Packet handler ("km") and game mode controller ("axh")
            .pin(HandlerPlayer, MemberSpec::field("g", Ref))
            .pin(GameModePlayer, MemberSpec::field("d", Ref))
            // Message payloads ("aik", "ajb", "ake", "aiy")
            .pin(ChatText, MemberSpec::field("a", Ref))
            .pin(MoveX, MemberSpec::field("a", F64))
            .pin(MoveY, MemberSpec::field("b", F64))
            .pin(MoveZ, MemberSpec::field("c", F64))
            .pin(PacketBlockPos, MemberSpec::method("e", &[], Kind(Ref)))
            .pin(PacketTarget, MemberSpec::method("b", &[], Kind(Ref)))
            // Block position ("is")
            .pin(PosX, MemberSpec::method("u", &[], Kind(I32)))
            .pin(PosY, MemberSpec::method("v", &[], Kind(I32)))
            .pin(PosZ, MemberSpec::method("w", &[], Kind(I32)))
            // Classification targets, most specific first
            .pin_category("axg", ClassCategory::Player)
            .pin_category("cii", ClassCategory::Tameable)
            .pin_category("dec", ClassCategory::Projectile)
            .pin_category("cq", ClassCategory::Living)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::MethodDesc;

    #[test]
    fn test_spec_filters_by_shape() {
        let spec = MemberSpec::method("a", &[ValueKind::F32], RetShape::Kind(ValueKind::I32));
        let hurt = HostMember::method("a", MethodDesc::parse("(f)i").unwrap());
        let send = HostMember::method("a", MethodDesc::parse("(A)v").unwrap());
        let field = HostMember::field("a", MethodDesc::parse("()i").unwrap());
        assert!(spec.matches(&hurt));
        assert!(!spec.matches(&send));
        assert!(!spec.matches(&field));
    }

    #[test]
    fn test_numeric_ret_accepts_any_numeric() {
        let spec = MemberSpec::method("eZ", &[], RetShape::Numeric);
        assert!(spec.matches(&HostMember::method("eZ", MethodDesc::parse("()f").unwrap())));
        assert!(spec.matches(&HostMember::method("eZ", MethodDesc::parse("()d").unwrap())));
        assert!(!spec.matches(&HostMember::method("eZ", MethodDesc::parse("()A").unwrap())));
        assert!(!spec.matches(&HostMember::method("eZ", MethodDesc::parse("()v").unwrap())));
    }

    #[test]
    fn test_pinned_profile_is_coherent() {
        let profile = HostProfile::pinned();
        assert!(profile.spec(LogicalOp::Health).is_some());
        assert!(profile.spec(LogicalOp::HandshakeAddress).is_some());
        // Same pinned name, separated purely by shape
        let slot = profile.spec(LogicalOp::InvSlot).unwrap();
        let set_slot = profile.spec(LogicalOp::SetInvSlot).unwrap();
        assert_eq!(slot.name, set_slot.name);
        assert_ne!(slot.params, set_slot.params);
        // Most specific category outranks the generic living ancestor
        let categories = profile.categories();
        let living = categories.iter().position(|(n, _)| n.as_ref() == "cq").unwrap();
        let tame = categories.iter().position(|(n, _)| n.as_ref() == "cii").unwrap();
        assert!(tame < living);
    }
}
