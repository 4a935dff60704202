//! Hook dispatch: the layer injected code calls into.
//!
//! Rewritten host methods cannot reference rich types - they only see static
//! entry points taking primitives and opaque object references. Those entry
//! points live on [`HookDispatch`]: each one converts its receivers into
//! adapter wrappers, fires the matching [`Event`] through the bus, consults
//! the command registry or permission provider where relevant, and answers
//! with a cancellation signal the injected code acts on.
//!
//! # Failure isolation
//!
//! Every entry point body runs under blanket recovery: internal errors *and
//! panics* are absorbed and answered as "no interception occurred" - never
//! cancel, never rethrow. A broken listener must not take the host down with
//! it. Swallowed failures are logged at `warn` so they are not invisible.
//!
//! # Collaborators
//!
//! The command registry and permission provider are owned elsewhere; this
//! crate consults them through the [`CommandRegistry`] and
//! [`PermissionProvider`] traits registered on the context.

mod event;
mod hooks;

use uuid::Uuid;

use crate::adapter::PlayerRef;

pub use event::{Event, EventBus, EventEnvelope, Listener};
pub use hooks::HookDispatch;

/// Command handling owned by the layer above this crate.
///
/// Consulted by [`HookDispatch::player_command`] after the command event ran
/// uncancelled. Returning `true` means the command was handled and the
/// host's own command path should not run.
pub trait CommandRegistry: Send + Sync {
    /// Dispatches a parsed command. `name` has no leading slash.
    fn dispatch(&self, sender: &PlayerRef, name: &str, args: &[&str]) -> bool;
}

/// Permission decisions owned by the layer above this crate.
pub trait PermissionProvider: Send + Sync {
    /// Whether the player holds the permission node.
    fn has_permission(&self, player: Uuid, node: &str) -> bool;
}
