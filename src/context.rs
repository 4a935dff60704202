//! The explicit context owning every shared cache.
//!
//! The original shape of this system kept its caches in ambient static
//! state. Here they are gathered into one [`GraftContext`] that is threaded
//! through wrapper construction and hook dispatch instead: resolution-once
//! semantics stay, hidden global state does not. Everything inside is
//! independently-atomic concurrent maps plus compute-once cells, so the
//! context is shared freely across the host's threads.

use std::sync::{Arc, OnceLock, RwLock};

use crate::adapter::{
    ClassificationCache, HostProfile, MemberLocator, MetadataStore, ServerRef,
};
use crate::dispatch::{CommandRegistry, EventBus, PermissionProvider};
use crate::handshake::HandshakeTable;
use crate::host::HostRef;

/// Shared state of one installed instrumentation core.
pub struct GraftContext {
    profile: Arc<HostProfile>,
    locator: MemberLocator,
    classifier: ClassificationCache,
    metadata: MetadataStore,
    handshake: HandshakeTable,
    bus: EventBus,
    commands: RwLock<Option<Arc<dyn CommandRegistry>>>,
    permissions: RwLock<Option<Arc<dyn PermissionProvider>>>,
    server: OnceLock<HostRef>,
}

impl GraftContext {
    /// Creates a context over a binding profile and handshake table.
    pub fn new(profile: HostProfile, handshake: HandshakeTable) -> Arc<GraftContext> {
        let profile = Arc::new(profile);
        let locator = MemberLocator::new(profile.clone());
        let classifier = ClassificationCache::new(profile.categories().to_vec());
        Arc::new(GraftContext {
            profile,
            locator,
            classifier,
            metadata: MetadataStore::new(),
            handshake,
            bus: EventBus::new(),
            commands: RwLock::new(None),
            permissions: RwLock::new(None),
            server: OnceLock::new(),
        })
    }

    /// The binding profile this context resolves through.
    pub fn profile(&self) -> &Arc<HostProfile> {
        &self.profile
    }

    /// The member locator cache.
    pub fn locator(&self) -> &MemberLocator {
        &self.locator
    }

    /// The classification cache.
    pub fn classifier(&self) -> &ClassificationCache {
        &self.classifier
    }

    /// The per-entity tag store.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// The handshake record table.
    pub fn handshake(&self) -> &HandshakeTable {
        &self.handshake
    }

    /// The event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Registers the external command registry.
    pub fn set_command_registry(&self, registry: Arc<dyn CommandRegistry>) {
        *write_lock!(self.commands) = Some(registry);
    }

    /// The registered command registry, if any.
    pub fn command_registry(&self) -> Option<Arc<dyn CommandRegistry>> {
        read_lock!(self.commands).clone()
    }

    /// Registers the external permission provider.
    pub fn set_permission_provider(&self, provider: Arc<dyn PermissionProvider>) {
        *write_lock!(self.permissions) = Some(provider);
    }

    /// The registered permission provider, if any.
    pub fn permission_provider(&self) -> Option<Arc<dyn PermissionProvider>> {
        read_lock!(self.permissions).clone()
    }

    /// Captures the host server object the first time it is observed.
    ///
    /// Several injected call sites may race to be first; the capture is
    /// idempotent and only the winner's object is kept. Returns whether this
    /// call was the one that captured.
    pub fn capture_server(&self, server: HostRef) -> bool {
        self.server.set(server).is_ok()
    }

    /// The server adapter, once a server object has been captured.
    pub fn server(self: &Arc<Self>) -> Option<ServerRef> {
        self.server
            .get()
            .map(|host| ServerRef::new(self.clone(), host.clone()))
    }
}
