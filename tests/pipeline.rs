//! End to end: classes flow through the installed agent, rewritten bodies
//! verify, and the injected call sites - simulated by resolving the same
//! symbolic names the rewriter emits - drive events through to listeners.

mod util;

use std::sync::{Arc, Mutex};

use hostgraft::bytecode::{decode_stream, verify_method, Op, UniversalBase};
use hostgraft::class::MemberFlags;
use hostgraft::prelude::*;

use util::{class_of, method_of, pinned_context, player_class, FakeObject};

fn installed(require_compatible: bool) -> GraftAgent {
    GraftAgent::install(pinned_context(require_compatible), pinned_rules())
}

/// The packet-handler class of the pinned host build, with the chat method.
fn chat_handler_class() -> ClassFile {
    class_of(
        "km",
        Some("jq"),
        vec![method_of(
            "a",
            "(Laik;)v",
            MemberFlags::PUBLIC,
            2,
            &[Op::Ret(None)],
        )],
    )
}

#[test]
fn test_instrumented_chat_handler_verifies_and_targets_hook() {
    let agent = installed(true);
    let original = chat_handler_class().to_bytes().unwrap();
    let rewritten = agent.instrument("km", &original).expect("chat rule applies");

    let parsed = ClassFile::from_bytes(&rewritten).unwrap();
    let method = &parsed.methods[0];
    verify_method(&parsed.name, method, &parsed.pool, &UniversalBase).unwrap();

    let decoded = decode_stream(&method.code, &parsed.pool).unwrap();
    let Some(Op::InvokeStatic(member)) = decoded.iter().map(|i| &i.op).find(|op| {
        matches!(op, Op::InvokeStatic(_))
    }) else {
        panic!("no injected hook call");
    };
    let member = parsed.pool.member_ref(*member).unwrap();
    assert_eq!(member.owner, "hostgraft/Hooks");
    assert_eq!(member.name, "player_chat");

    // The symbolic reference resolves through the linkage table, from any
    // loading context.
    assert!(agent
        .linkage()
        .resolve(&format!("{}.{}", member.owner, member.name))
        .is_some());
}

/// Packet-handler object whose pinned player field holds a real player.
fn handler_with_player() -> (HostRef, HostRef) {
    let player_cls = player_class("steve");
    player_cls.push_member(HostMember::method("gI", MethodDesc::parse("()A").unwrap()));
    let player: HostRef = Arc::new(
        FakeObject::new(player_cls)
            .with_method("gI", "()A", |_| HostValue::Str("steve".to_string())),
    );

    let handler_cls = HostClass::root("km");
    handler_cls.push_member(HostMember::field("g", MethodDesc::parse("()Laxg;").unwrap()));
    let handler: HostRef =
        Arc::new(FakeObject::new(handler_cls).with_field("g", HostValue::Object(player.clone())));
    (handler, player)
}

fn chat_packet(text: &str) -> HostRef {
    let class = HostClass::root("aik");
    class.push_member(HostMember::field("a", MethodDesc::parse("()A").unwrap()));
    Arc::new(FakeObject::new(class).with_field("a", HostValue::Str(text.to_string())))
}

#[test]
fn test_chat_binding_cancellation_round_trip() {
    let agent = installed(true);
    let ctx = agent.context().clone();

    ctx.bus().subscribe(|envelope| {
        if let Event::PlayerChat { message, .. } = &envelope.event {
            if message.contains("creeper") {
                envelope.cancel();
            }
        }
    });

    let (handler, _player) = handler_with_player();
    let binding = agent
        .linkage()
        .resolve("hostgraft/Hooks.player_chat")
        .unwrap();

    let blocked = binding(&[
        HostValue::Object(handler.clone()),
        HostValue::Object(chat_packet("creeper rights")),
    ]);
    assert_eq!(blocked.as_bool(), Some(true));

    let allowed = binding(&[
        HostValue::Object(handler),
        HostValue::Object(chat_packet("hello world")),
    ]);
    assert_eq!(allowed.as_bool(), Some(false));
}

#[test]
fn test_pre_return_death_hook_fires_event() {
    let agent = installed(true);
    let ctx = agent.context().clone();

    // Instrument the living-entity class: death method gets the injection.
    let class = class_of(
        "cq",
        Some("ce"),
        vec![method_of("eV", "()v", MemberFlags::PUBLIC, 1, &[Op::Ret(None)])],
    );
    let rewritten = agent
        .instrument("cq", &class.to_bytes().unwrap())
        .expect("death rule applies");
    let parsed = ClassFile::from_bytes(&rewritten).unwrap();
    verify_method(&parsed.name, &parsed.methods[0], &parsed.pool, &UniversalBase).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.bus().subscribe(move |envelope| {
        sink.lock().unwrap().push(envelope.event.name().to_string());
    });

    // Simulate the injected call site firing at run time.
    let zombie_cls = {
        let entity = HostClass::root("ce");
        let living = HostClass::new("cq", Some(entity), Vec::new());
        HostClass::new("zombie", Some(living), Vec::new())
    };
    let zombie: HostRef = Arc::new(FakeObject::new(zombie_cls));
    let binding = agent
        .linkage()
        .resolve("hostgraft/Hooks.entity_death")
        .unwrap();
    assert!(matches!(binding(&[HostValue::Object(zombie)]), HostValue::Unit));

    assert_eq!(seen.lock().unwrap().as_slice(), ["entity_death"]);
}

#[test]
fn test_full_replace_brand() {
    let agent = installed(true);

    let class = class_of(
        "bq",
        None,
        vec![method_of(
            "a",
            "()A",
            MemberFlags::PUBLIC,
            1,
            // Original builder: load a constant, return it.
            &[Op::LdcNull, Op::Ret(Some(hostgraft::bytecode::ValueKind::Ref))],
        )],
    );
    let rewritten = agent
        .instrument("bq", &class.to_bytes().unwrap())
        .expect("brand rule applies");
    let parsed = ClassFile::from_bytes(&rewritten).unwrap();
    verify_method(&parsed.name, &parsed.methods[0], &parsed.pool, &UniversalBase).unwrap();

    // The whole body is now receiver + call + return.
    let decoded = decode_stream(&parsed.methods[0].code, &parsed.pool).unwrap();
    assert_eq!(decoded.len(), 3);

    let responder: HostRef = Arc::new(FakeObject::new(HostClass::root("bq")));
    let binding = agent
        .linkage()
        .resolve("hostgraft/Hooks.server_brand")
        .unwrap();
    let brand = binding(&[HostValue::Object(responder)]);
    assert!(brand.as_str().unwrap().starts_with("hostgraft "));
}

#[test]
fn test_field_override_forces_constant() {
    let agent = installed(true);

    let mut class = class_of(
        "ts",
        None,
        vec![method_of("ci", "()v", MemberFlags::PUBLIC | MemberFlags::STATIC, 0, &[Op::Ret(None)])],
    );
    class.fields.push(hostgraft::class::Field {
        flags: MemberFlags::PUBLIC | MemberFlags::STATIC,
        name: "c".to_string(),
        desc: MethodDesc::field(ParamKind::Ref(None)),
    });

    let rewritten = agent
        .instrument("ts", &class.to_bytes().unwrap())
        .expect("override rule applies");
    let parsed = ClassFile::from_bytes(&rewritten).unwrap();
    verify_method(&parsed.name, &parsed.methods[0], &parsed.pool, &UniversalBase).unwrap();

    let decoded = decode_stream(&parsed.methods[0].code, &parsed.pool).unwrap();
    let Op::LdcStr(text) = decoded[0].op else {
        panic!("expected the forced constant load first");
    };
    assert_eq!(parsed.pool.utf8(text).unwrap(), "");
    let Op::PutStatic(member) = decoded[1].op else {
        panic!("expected the static store");
    };
    let member = parsed.pool.member_ref(member).unwrap();
    assert_eq!(member.owner, "ts");
    assert_eq!(member.name, "c");
}

#[test]
fn test_command_registry_consulted_after_event() {
    struct Registry(Arc<Mutex<Vec<String>>>);
    impl CommandRegistry for Registry {
        fn dispatch(&self, _sender: &PlayerRef, name: &str, args: &[&str]) -> bool {
            self.0.lock().unwrap().push(format!("{name}:{}", args.join(",")));
            name == "home"
        }
    }

    let agent = installed(true);
    let ctx = agent.context().clone();
    let handled = Arc::new(Mutex::new(Vec::new()));
    ctx.set_command_registry(Arc::new(Registry(handled.clone())));

    let (handler, _player) = handler_with_player();
    let dispatch = agent.dispatch();

    // Handled command: suppress the host's own path.
    assert!(dispatch.player_command(&handler, "/home set base"));
    // Unknown command: fall through to the host.
    assert!(!dispatch.player_command(&handler, "/warp hub"));

    let log = handled.lock().unwrap();
    assert_eq!(log.as_slice(), ["home:set,base", "warp:hub"]);
}

#[test]
fn test_server_capture_through_run_hook() {
    let agent = installed(true);
    let ctx = agent.context().clone();

    let server_cls = HostClass::root("dms");
    server_cls.push_member(HostMember::method("q", MethodDesc::parse("()A").unwrap()));
    let server: HostRef = Arc::new(
        FakeObject::new(server_cls).with_method("q", "()A", |_| {
            HostValue::Str("release-47".to_string())
        }),
    );

    assert!(ctx.server().is_none());
    assert!(!agent.dispatch().server_ready(&server));
    let adapter = ctx.server().expect("server captured");
    assert_eq!(adapter.version(), "release-47");

    // Second observation is ignored.
    let other: HostRef = Arc::new(FakeObject::new(HostClass::root("dms")));
    assert!(!agent.dispatch().server_ready(&other));
    assert_eq!(ctx.server().unwrap().version(), "release-47");
}

#[test]
fn test_join_event_fires_for_player_receiver() {
    let agent = installed(false);
    let ctx = agent.context().clone();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.bus().subscribe(move |envelope| {
        sink.lock().unwrap().push(envelope.event.name().to_string());
    });

    let (_, player) = handler_with_player();
    agent.dispatch().player_join(&player);
    assert_eq!(seen.lock().unwrap().as_slice(), ["player_join"]);
}
