//! Events fired from injected call sites, and the listener bus.
//!
//! Event payloads are data plus adapter wrappers - the raw host objects a
//! hook receives are converted before anything user-visible sees them.
//! Listeners run synchronously, inline, on whichever host thread reached the
//! injected call site; there is no queuing and no hand-off. A cancellable
//! event that any listener cancels makes the dispatch entry point tell the
//! injected code to short-circuit the original method.

use std::sync::RwLock;

use crate::adapter::{BlockRef, EntityRef, ItemRef, Location, PlayerRef};

/// A gameplay or connection event observed through an injected hook.
#[derive(Clone)]
pub enum Event {
    /// A player finished joining
    PlayerJoin {
        /// The joining player
        player: PlayerRef,
    },
    /// A player is leaving
    PlayerQuit {
        /// The leaving player
        player: PlayerRef,
    },
    /// A player sent a chat line. Cancellable.
    PlayerChat {
        /// The sender
        player: PlayerRef,
        /// The chat line
        message: String,
    },
    /// A player issued a command line (leading slash included). Cancellable.
    PlayerCommand {
        /// The sender
        player: PlayerRef,
        /// The full command line
        command: String,
    },
    /// A player moved. Cancellable.
    PlayerMove {
        /// The moving player
        player: PlayerRef,
        /// Where they are moving to
        to: Location,
    },
    /// A player respawned
    PlayerRespawn {
        /// The respawning player
        player: PlayerRef,
    },
    /// A player was teleported; observed after the move landed
    PlayerTeleport {
        /// The teleported player
        player: PlayerRef,
        /// Where they ended up, when readable
        to: Option<Location>,
    },
    /// A living entity died
    EntityDeath {
        /// The dying entity
        entity: EntityRef,
    },
    /// A player is breaking a block. Cancellable.
    BlockBreak {
        /// The breaking player
        player: PlayerRef,
        /// The block being broken
        block: BlockRef,
    },
    /// A player is placing against a block. Cancellable.
    BlockPlace {
        /// The placing player
        player: PlayerRef,
        /// The block being placed against
        block: BlockRef,
        /// The item in their hand, when readable
        item: Option<ItemRef>,
    },
    /// One entity is damaging another. Cancellable.
    EntityDamageByEntity {
        /// The damaging entity
        attacker: EntityRef,
        /// The damaged entity
        victim: EntityRef,
        /// Damage amount, host units
        amount: f64,
    },
    /// A player closed a container
    ContainerClose {
        /// The closing player
        player: PlayerRef,
    },
}

impl Event {
    /// Stable event name, for listener-side filtering and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Event::PlayerJoin { .. } => "player_join",
            Event::PlayerQuit { .. } => "player_quit",
            Event::PlayerChat { .. } => "player_chat",
            Event::PlayerCommand { .. } => "player_command",
            Event::PlayerMove { .. } => "player_move",
            Event::PlayerRespawn { .. } => "player_respawn",
            Event::PlayerTeleport { .. } => "player_teleport",
            Event::EntityDeath { .. } => "entity_death",
            Event::BlockBreak { .. } => "block_break",
            Event::BlockPlace { .. } => "block_place",
            Event::EntityDamageByEntity { .. } => "entity_damage_by_entity",
            Event::ContainerClose { .. } => "container_close",
        }
    }

    /// Whether listeners may cancel the underlying host operation.
    pub fn cancellable(&self) -> bool {
        matches!(
            self,
            Event::PlayerChat { .. }
                | Event::PlayerCommand { .. }
                | Event::PlayerMove { .. }
                | Event::BlockBreak { .. }
                | Event::BlockPlace { .. }
                | Event::EntityDamageByEntity { .. }
        )
    }
}

/// An event in flight through the listener chain.
pub struct EventEnvelope {
    /// The event payload
    pub event: Event,
    cancelled: bool,
}

impl EventEnvelope {
    /// Wraps an event for firing.
    pub fn new(event: Event) -> Self {
        EventEnvelope {
            event,
            cancelled: false,
        }
    }

    /// Requests cancellation; ignored for non-cancellable events.
    pub fn cancel(&mut self) {
        if self.event.cancellable() {
            self.cancelled = true;
        }
    }

    /// Whether a listener cancelled this event.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// A registered event listener.
pub type Listener = dyn Fn(&mut EventEnvelope) + Send + Sync;

/// The listener registry.
///
/// Firing walks every listener in registration order on the calling thread.
/// Listener panics are *not* absorbed here - the dispatch entry points wrap
/// every hook body in blanket recovery, and keeping the bus transparent
/// keeps that recovery in exactly one place.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Box<Listener>>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Registers a listener for every event.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&mut EventEnvelope) + Send + Sync + 'static,
    {
        write_lock!(self.listeners).push(Box::new(listener));
    }

    /// Fires an event through all listeners; returns the final cancelled flag.
    pub fn fire(&self, event: Event) -> bool {
        let mut envelope = EventEnvelope::new(event);
        let listeners = read_lock!(self.listeners);
        for listener in listeners.iter() {
            listener(&mut envelope);
        }
        envelope.is_cancelled()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        read_lock!(self.listeners).len()
    }
}
