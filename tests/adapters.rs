//! The reflective adapter layer: classification, structural binding, and
//! the default-on-failure contract, all against scripted host objects.

mod util;

use std::sync::Arc;

use hostgraft::prelude::*;
use uuid::Uuid;

use util::{pinned_context, player_class, FakeObject};

/// `ce <- cq <- <concrete>` - a living entity that is not a player.
fn living_class(concrete: &str) -> Arc<HostClass> {
    let entity = HostClass::root("ce");
    let living = HostClass::new("cq", Some(entity), Vec::new());
    HostClass::new(concrete, Some(living), Vec::new())
}

#[test]
fn test_classification_categories() {
    let ctx = pinned_context(true);

    let zombie: HostRef = Arc::new(FakeObject::new(living_class("zombie")));
    let steve: HostRef = Arc::new(FakeObject::new(player_class("steve")));
    let boat: HostRef = Arc::new(FakeObject::new(HostClass::root("boat")));

    assert_eq!(
        wrap_entity(ctx.clone(), zombie).category(),
        ClassCategory::Living
    );
    assert_eq!(
        wrap_entity(ctx.clone(), steve).category(),
        ClassCategory::Player
    );
    assert_eq!(
        wrap_entity(ctx.clone(), boat).category(),
        ClassCategory::GenericEntity
    );
}

#[test]
fn test_classification_idempotent_and_exact_class_keyed() {
    let ctx = pinned_context(true);
    let zombie_class = living_class("zombie");
    let skeleton_class = living_class("skeleton");

    for _ in 0..4 {
        let zombie: HostRef = Arc::new(FakeObject::new(zombie_class.clone()));
        let skeleton: HostRef = Arc::new(FakeObject::new(skeleton_class.clone()));
        assert_eq!(wrap_entity(ctx.clone(), zombie).category(), ClassCategory::Living);
        assert_eq!(wrap_entity(ctx.clone(), skeleton).category(), ClassCategory::Living);
    }

    // Same category, two cache entries: keyed by exact class, not category.
    assert_eq!(ctx.classifier().entry_count(), 2);
}

#[test]
fn test_casts_follow_classification() {
    let ctx = pinned_context(true);
    let steve: HostRef = Arc::new(FakeObject::new(player_class("steve")));
    let entity = wrap_entity(ctx.clone(), steve);

    assert!(entity.as_living().is_some());
    assert!(entity.as_player().is_some());
    assert!(entity.as_tameable().is_none());
    assert!(entity.as_projectile().is_none());

    let boat: HostRef = Arc::new(FakeObject::new(HostClass::root("boat")));
    let boat = wrap_entity(ctx, boat);
    assert!(boat.as_living().is_none());
    assert!(boat.as_player().is_none());
}

#[test]
fn test_defaults_when_members_are_missing() {
    // A living entity whose class declares nothing at all: every accessor
    // must answer its documented default instead of erroring.
    let ctx = pinned_context(true);
    let bare: HostRef = Arc::new(FakeObject::new(living_class("husk")));
    let entity = wrap_entity(ctx, bare);
    let living = entity.as_living().unwrap();

    assert_eq!(living.health(), 20.0);
    assert_eq!(living.max_health(), 20.0);
    assert!(!living.is_dead());
    assert!(!living.damage(5.0));
    assert_eq!(living.unique_id(), Uuid::nil());
    assert!(living.is_valid());
    assert!(living.location().is_none());
    assert!(living.world().is_none());
    living.set_health(10.0); // must not panic
    living.teleport(&Location { world: None, x: 0.0, y: 0.0, z: 0.0, yaw: 0.0, pitch: 0.0 });
}

#[test]
fn test_player_defaults_when_members_are_missing() {
    let ctx = pinned_context(true);
    let bare: HostRef = Arc::new(FakeObject::new(player_class("ghost")));
    let player = wrap_entity(ctx, bare).as_player().unwrap();

    assert_eq!(player.name(), "");
    assert!(player.held_item().is_none());
    assert!(player.inventory().is_none());
    assert!(!player.has_permission("core.teleport"));
    player.send_message("hello"); // must not panic
}

#[test]
fn test_inventory_and_item_defaults() {
    let ctx = pinned_context(true);
    let bare: HostRef = Arc::new(FakeObject::new(HostClass::root("bcn")));
    let inventory = InventoryRef::new(ctx.clone(), bare);
    assert_eq!(inventory.size(), 0);
    assert!(inventory.item(0).is_none());
    inventory.clear(); // must not panic

    let bare_item: HostRef = Arc::new(FakeObject::new(HostClass::root("dkj")));
    let item = ItemRef::new(ctx, bare_item);
    assert_eq!(item.kind(), "");
    assert_eq!(item.count(), 0);
}

/// A living entity with scripted health members.
fn scripted_living() -> Arc<FakeObject> {
    let class = living_class("witch");
    class.push_member(HostMember::method("eZ", MethodDesc::parse("()f").unwrap()));
    class.push_member(HostMember::method("fq", MethodDesc::parse("()f").unwrap()));
    class.push_member(HostMember::method("fa", MethodDesc::parse("()i").unwrap()));
    class.push_member(HostMember::method("a", MethodDesc::parse("(f)i").unwrap()));
    class.push_member(HostMember::method("cY", MethodDesc::parse("()A").unwrap()));

    let id = Uuid::new_v4();
    Arc::new(
        FakeObject::new(class)
            .with_method("eZ", "()f", |_| HostValue::F32(7.5))
            .with_method("fq", "()f", |_| HostValue::F32(30.0))
            .with_method("fa", "()i", |_| HostValue::I32(0))
            .with_method("a", "(f)i", |_| HostValue::Bool(true))
            .with_method("cY", "()A", move |_| HostValue::Uuid(id)),
    )
}

#[test]
fn test_structural_binding_happy_path() {
    let ctx = pinned_context(true);
    let witch: HostRef = scripted_living();
    let living = wrap_entity(ctx, witch).as_living().unwrap();

    assert_eq!(living.health(), 7.5);
    assert_eq!(living.max_health(), 30.0);
    assert!(!living.is_dead());
    assert!(living.damage(3.0));
    assert_ne!(living.unique_id(), Uuid::nil());
}

#[test]
fn test_locator_resolves_once_per_class() {
    let ctx = pinned_context(true);
    let first: HostRef = scripted_living();
    let second: HostRef = scripted_living();

    let a = wrap_entity(ctx.clone(), first).as_living().unwrap();
    let b = wrap_entity(ctx.clone(), second).as_living().unwrap();
    a.health();
    a.health();
    b.health();

    // One cache entry for (witch, health) regardless of instances/calls;
    // classification adds nothing to the locator cache.
    let after_health = ctx.locator().cached_count();
    a.health();
    assert_eq!(ctx.locator().cached_count(), after_health);
}

#[test]
fn test_metadata_keyed_by_entity_identity() {
    let ctx = pinned_context(true);
    let first: HostRef = scripted_living();

    let wrapper_a = wrap_entity(ctx.clone(), first.clone());
    let wrapper_b = wrap_entity(ctx.clone(), first);

    wrapper_a.set_metadata("claimed", HostValue::Bool(true));
    // A fresh wrapper over the same host object sees the same tags.
    assert!(wrapper_b.has_metadata("claimed"));
    assert_eq!(wrapper_b.metadata("claimed").unwrap().as_bool(), Some(true));

    wrapper_b.remove_metadata("claimed");
    assert!(!wrapper_a.has_metadata("claimed"));
    assert_eq!(ctx.metadata().entity_count(), 0);
}

#[test]
fn test_permission_provider_consulted() {
    struct AllowList(Uuid);
    impl PermissionProvider for AllowList {
        fn has_permission(&self, player: Uuid, node: &str) -> bool {
            player == self.0 && node == "core.fly"
        }
    }

    let ctx = pinned_context(true);
    let id = Uuid::new_v4();
    let class = player_class("steve");
    class.push_member(HostMember::method("cY", MethodDesc::parse("()A").unwrap()));
    let steve: HostRef = Arc::new(
        FakeObject::new(class).with_method("cY", "()A", move |_| HostValue::Uuid(id)),
    );

    let player = wrap_entity(ctx.clone(), steve).as_player().unwrap();
    assert!(!player.has_permission("core.fly"));

    ctx.set_permission_provider(Arc::new(AllowList(id)));
    assert!(player.has_permission("core.fly"));
    assert!(!player.has_permission("core.ban"));
}
