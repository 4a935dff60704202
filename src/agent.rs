//! Bootstrap: installing the engine ahead of the host's own startup.
//!
//! The agent is the root object an embedder creates before the host runs.
//! It owns the [`GraftContext`], the [`TransformEngine`] over the pinned
//! rule set, and the [`LinkageTable`] - the crate's answer to "injected
//! calls must resolve from any class-loading context the host creates":
//! every dispatch entry the rewriter references symbolically
//! (`hostgraft/Hooks.<name>`) is registered once into a shared resolution
//! table the host shim consults regardless of which loader asked.
//!
//! [`GraftAgent::instrument`] is the single host-facing entry in the load
//! pipeline. It also feeds the [`ClassRegistry`] that backs ancestor
//! resolution during verification - recording superclass facts costs a
//! parse, and in exchange reference merges stop flattening to the universal
//! base the moment both sides have been seen.

use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::RetShape;
use crate::bytecode::{ClassRegistry, RegistryResolver, ValueKind};
use crate::class::ClassFile;
use crate::context::GraftContext;
use crate::dispatch::HookDispatch;
use crate::host::{HostRef, HostValue};
use crate::transform::{
    DefaultReturn, FieldValue, MethodPattern, ParamPattern, RewriteAction, TransformEngine,
    TransformRule, HOOK_OWNER,
};

/// A resolvable hook binding: raw values in, raw value out.
pub type HookFn = Arc<dyn Fn(&[HostValue]) -> HostValue + Send + Sync>;

/// Shared symbol-to-hook resolution table.
///
/// Injected call sites reference hooks by symbolic name; the embedder's shim
/// resolves those names here at call time, from whatever loading context the
/// host happens to be in. Binding is idempotent - the first registration of
/// a symbol wins, so racing installers are harmless.
#[derive(Default)]
pub struct LinkageTable {
    entries: DashMap<String, HookFn>,
}

impl LinkageTable {
    /// Creates an empty table.
    pub fn new() -> LinkageTable {
        LinkageTable::default()
    }

    /// Registers a hook under `HOOK_OWNER.name`, first registration wins.
    pub fn bind<F>(&self, name: &str, hook: F)
    where
        F: Fn(&[HostValue]) -> HostValue + Send + Sync + 'static,
    {
        self.entries
            .entry(format!("{HOOK_OWNER}.{name}"))
            .or_insert_with(|| Arc::new(hook));
    }

    /// Resolves a fully qualified symbol.
    pub fn resolve(&self, symbol: &str) -> Option<HookFn> {
        self.entries.get(symbol).map(|entry| entry.value().clone())
    }

    /// Number of bound symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The installed instrumentation core.
pub struct GraftAgent {
    ctx: Arc<GraftContext>,
    dispatch: HookDispatch,
    engine: TransformEngine,
    registry: Arc<ClassRegistry>,
    linkage: Arc<LinkageTable>,
}

impl GraftAgent {
    /// Installs the core: builds the engine over `rules`, wires ancestor
    /// resolution to the seen-class registry, and binds every dispatch
    /// entry into the linkage table.
    pub fn install(ctx: Arc<GraftContext>, rules: Vec<TransformRule>) -> GraftAgent {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(RegistryResolver::new(registry.clone()));
        let engine = TransformEngine::with_resolver(rules, resolver);
        let dispatch = HookDispatch::new(ctx.clone());
        let linkage = Arc::new(LinkageTable::new());
        register_hooks(&linkage, &dispatch);

        tracing::info!(
            rules = engine.rules().len(),
            hooks = linkage.len(),
            "instrumentation core installed"
        );
        GraftAgent {
            ctx,
            dispatch,
            engine,
            registry,
            linkage,
        }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<GraftContext> {
        &self.ctx
    }

    /// The dispatch surface injected code resolves to.
    pub fn dispatch(&self) -> &HookDispatch {
        &self.dispatch
    }

    /// The symbol resolution table for injected calls.
    pub fn linkage(&self) -> &Arc<LinkageTable> {
        &self.linkage
    }

    /// Superclass facts observed so far.
    pub fn class_registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// The single entry in the host's class-loading pipeline.
    ///
    /// Records the class's hierarchy facts, then offers it to the transform
    /// engine. `None` means "load the original bytes unchanged" - by far the
    /// common answer, and the only answer for anything unparseable.
    pub fn instrument(&self, class_name: &str, data: &[u8]) -> Option<Vec<u8>> {
        if let Ok(class) = ClassFile::from_bytes(data) {
            self.registry.record(&class.name, class.superclass.as_deref());
        }
        self.engine.transform(class_name, data)
    }
}

fn obj(args: &[HostValue], index: usize) -> Option<HostRef> {
    args.get(index)?.as_object().cloned()
}

#[allow(clippy::too_many_lines)]
fn register_hooks(table: &LinkageTable, dispatch: &HookDispatch) {
    fn two(
        table: &LinkageTable,
        dispatch: &HookDispatch,
        name: &'static str,
        hook: fn(&HookDispatch, &HostRef, &HostRef) -> bool,
    ) {
        let dispatch = dispatch.clone();
        table.bind(name, move |args| match (obj(args, 0), obj(args, 1)) {
            (Some(a), Some(b)) => HostValue::Bool(hook(&dispatch, &a, &b)),
            _ => HostValue::Bool(false),
        });
    }

    fn one_void(
        table: &LinkageTable,
        dispatch: &HookDispatch,
        name: &'static str,
        hook: fn(&HookDispatch, &HostRef),
    ) {
        let dispatch = dispatch.clone();
        table.bind(name, move |args| {
            if let Some(receiver) = obj(args, 0) {
                hook(&dispatch, &receiver);
            }
            HostValue::Unit
        });
    }

    two(table, dispatch, "player_chat", |d, a, b| d.player_chat(a, b));
    two(table, dispatch, "player_move", |d, a, b| d.player_move(a, b));
    two(table, dispatch, "entity_damage", |d, a, b| d.entity_damage(a, b));
    two(table, dispatch, "block_break", |d, a, b| d.block_break(a, b));
    two(table, dispatch, "block_place", |d, a, b| d.block_place(a, b));
    two(table, dispatch, "container_close", |d, a, b| d.container_close(a, b));
    two(table, dispatch, "player_quit", |d, a, b| d.player_quit(a, b));
    two(table, dispatch, "handshake_received", |d, a, b| {
        d.handshake_received(a, b)
    });
    two(table, dispatch, "verify_on_join", |d, a, b| d.verify_on_join(a, b));

    one_void(table, dispatch, "player_join", |d, a| d.player_join(a));
    one_void(table, dispatch, "player_respawn", |d, a| d.player_respawn(a));
    one_void(table, dispatch, "entity_death", |d, a| d.entity_death(a));
    one_void(table, dispatch, "entity_teleport", |d, a| d.entity_teleport(a));

    let d = dispatch.clone();
    table.bind("player_command", move |args| {
        let command = args.get(1).and_then(HostValue::as_str);
        match (obj(args, 0), command) {
            (Some(handler), Some(line)) => HostValue::Bool(d.player_command(&handler, line)),
            _ => HostValue::Bool(false),
        }
    });

    let d = dispatch.clone();
    table.bind("server_ready", move |args| match obj(args, 0) {
        Some(server) => HostValue::Bool(d.server_ready(&server)),
        None => HostValue::Bool(false),
    });

    let d = dispatch.clone();
    table.bind("server_brand", move |args| match obj(args, 0) {
        Some(responder) => HostValue::Str(d.server_brand(&responder)),
        None => HostValue::Str(String::new()),
    });
}

/// The rule set pinned for the host build this crate currently targets.
///
/// Mirrors the profile in [`crate::adapter::HostProfile::pinned`]: the class
/// and method names here are the same opaque pins, and every hook name has a
/// binding registered by [`GraftAgent::install`].
pub fn pinned_rules() -> Vec<TransformRule> {
    use DefaultReturn::{False, Void};
    use ParamPattern::Kind;
    use RewriteAction::{FieldOverride, FullReplace, GuardedCallout, PreReturnInject};

    let r = ParamPattern::ref_to;
    vec![
        // Packet handler ("km"): one method name, many message shapes.
        TransformRule::new(
            "km",
            MethodPattern::new("a", &[r("aik")], RetShape::Void),
            GuardedCallout { hook: "player_chat", default: Void },
        ),
        TransformRule::new(
            "km",
            MethodPattern::new("b", &[Kind(ValueKind::Ref)], RetShape::Void),
            GuardedCallout { hook: "player_command", default: Void },
        ),
        TransformRule::new(
            "km",
            MethodPattern::new("a", &[r("ajb")], RetShape::Void),
            GuardedCallout { hook: "player_move", default: Void },
        ),
        TransformRule::new(
            "km",
            MethodPattern::new("a", &[r("aiy")], RetShape::Void),
            GuardedCallout { hook: "entity_damage", default: Void },
        ),
        TransformRule::new(
            "km",
            MethodPattern::new("a", &[r("ake")], RetShape::Void),
            GuardedCallout { hook: "block_place", default: Void },
        ),
        TransformRule::new(
            "km",
            MethodPattern::new("a", &[r("ait")], RetShape::Void),
            GuardedCallout { hook: "container_close", default: Void },
        ),
        // Handshake handler ("hs").
        TransformRule::new(
            "hs",
            MethodPattern::new("a", &[r("akj")], RetShape::Void),
            GuardedCallout { hook: "handshake_received", default: Void },
        ),
        // Player list ("bo"): join safety net at entry, quit observation.
        TransformRule::new(
            "bo",
            MethodPattern::new("a", &[r("nw"), r("axg"), r("axu")], RetShape::Void),
            GuardedCallout { hook: "verify_on_join", default: Void },
        ),
        TransformRule::new(
            "bo",
            MethodPattern::new("b", &[r("axg")], RetShape::Void),
            GuardedCallout { hook: "player_quit", default: Void },
        ),
        // Game mode controller ("axh"): cancellable block break.
        TransformRule::new(
            "axh",
            MethodPattern::new("a", &[r("is")], RetShape::Kind(ValueKind::I32)),
            GuardedCallout { hook: "block_break", default: False },
        ),
        // Pre-return observation sites.
        TransformRule::new(
            "axg",
            MethodPattern::new("gM", &[], RetShape::Void),
            PreReturnInject { hook: "player_join" },
        ),
        TransformRule::new(
            "axg",
            MethodPattern::new("gN", &[], RetShape::Void),
            PreReturnInject { hook: "player_respawn" },
        ),
        TransformRule::new(
            "cq",
            MethodPattern::new("eV", &[], RetShape::Void),
            PreReturnInject { hook: "entity_death" },
        ),
        TransformRule::new(
            "ce",
            MethodPattern::new(
                "b",
                &[
                    Kind(ValueKind::F64),
                    Kind(ValueKind::F64),
                    Kind(ValueKind::F64),
                    Kind(ValueKind::F32),
                    Kind(ValueKind::F32),
                ],
                RetShape::Void,
            ),
            PreReturnInject { hook: "entity_teleport" },
        ),
        // Server run loop ("dms"): capture the instance, never cancel.
        TransformRule::new(
            "dms",
            MethodPattern::new("w", &[], RetShape::Void),
            GuardedCallout { hook: "server_ready", default: Void },
        ),
        // Status responder ("bq"): brand string fully displaced.
        TransformRule::new(
            "bq",
            MethodPattern::new("a", &[], RetShape::Kind(ValueKind::Ref)),
            FullReplace { hook: "server_brand" },
        ),
        // Title screen analog ("ts"): copyright text forced empty.
        TransformRule::new(
            "ts",
            MethodPattern::new("ci", &[], RetShape::Void),
            FieldOverride {
                field: "c".to_string(),
                value: FieldValue::Str(String::new()),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::HostProfile;
    use crate::handshake::HandshakeTable;

    fn agent() -> GraftAgent {
        let ctx = GraftContext::new(HostProfile::pinned(), HandshakeTable::new(true, "0.1.0"));
        GraftAgent::install(ctx, pinned_rules())
    }

    #[test]
    fn test_every_pinned_hook_is_bound() {
        let agent = agent();
        for rule in agent.engine.rules() {
            let hook = match &rule.action {
                RewriteAction::GuardedCallout { hook, .. }
                | RewriteAction::FullReplace { hook }
                | RewriteAction::PreReturnInject { hook } => hook,
                RewriteAction::FieldOverride { .. } => continue,
            };
            assert!(
                agent.linkage().resolve(&format!("{HOOK_OWNER}.{hook}")).is_some(),
                "hook '{hook}' has no linkage binding"
            );
        }
    }

    #[test]
    fn test_binding_is_idempotent() {
        let agent = agent();
        let before = agent.linkage().len();
        register_hooks(agent.linkage(), agent.dispatch());
        assert_eq!(agent.linkage().len(), before);
    }

    #[test]
    fn test_unmatched_class_passes_through() {
        let agent = agent();
        assert!(agent.instrument("zz", &[0x00, 0x01, 0x02]).is_none());
    }

    #[test]
    fn test_unparseable_target_class_left_alone() {
        let agent = agent();
        assert!(agent.instrument("km", &[0xFF; 16]).is_none());
    }
}
