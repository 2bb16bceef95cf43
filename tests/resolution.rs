//! End-to-end resolution through the engine and the defaults chain.

use std::sync::Arc;
use std::thread;

use uuid::Uuid;
use warden_core::{
    ContextSet, Engine, EngineConfig, MemoryRegistry, NodeBuilder, Subject, SubjectKind, SubjectRegistry,
    Tristate, User,
};

fn setup() -> (Arc<MemoryRegistry>, Engine) {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = Engine::new(registry.clone(), EngineConfig::default());
    (registry, engine)
}

fn global() -> ContextSet {
    ContextSet::global()
}

#[test]
fn undefined_propagates_to_false() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    let view = engine.subject(g.as_ref());
    assert_eq!(view.get_permission(&global(), "x.y"), Tristate::Undefined);
    assert!(!view.has_permission(&global(), "x.y"));
}

#[test]
fn exact_node_beats_wildcard() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    let data = g.subject_data();
    data.set_permission(&global(), "a.*", Tristate::True).unwrap();
    data.set_permission(&global(), "a.b", Tristate::False).unwrap();

    let view = engine.subject(g.as_ref());
    assert_eq!(view.get_permission(&global(), "a.b"), Tristate::False);
    assert_eq!(view.get_permission(&global(), "a.c"), Tristate::True);
    assert_eq!(view.get_permission(&global(), "a"), Tristate::Undefined);
}

#[test]
fn highest_priority_prefix_wins() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    g.subject_data().set_node(NodeBuilder::prefix(10, "[A]").build().unwrap());
    g.subject_data().set_node(NodeBuilder::prefix(20, "[B]").build().unwrap());

    assert_eq!(engine.subject(g.as_ref()).get_option(&global(), "prefix").as_deref(), Some("[B]"));
    assert_eq!(engine.subject(g.as_ref()).get_option(&global(), "PREFIX").as_deref(), Some("[B]"));
}

#[test]
fn inherited_prefix_competes_on_priority() {
    let (registry, engine) = setup();
    let child = registry.insert_group("child");
    child.subject_data().add_parent(&global(), "parent").unwrap();
    child.subject_data().set_node(NodeBuilder::prefix(5, "[Child]").build().unwrap());
    let parent = registry.insert_group("parent");
    parent.subject_data().set_node(NodeBuilder::prefix(50, "[Parent]").build().unwrap());

    assert_eq!(engine.subject(child.as_ref()).get_option(&global(), "prefix").as_deref(), Some("[Parent]"));
}

#[test]
fn cyclic_inheritance_terminates() {
    let (registry, engine) = setup();
    let x = registry.insert_group("x");
    let y = registry.insert_group("y");
    x.subject_data().add_parent(&global(), "y").unwrap();
    y.subject_data().add_parent(&global(), "x").unwrap();

    let view = engine.subject(x.as_ref());
    assert_eq!(view.get_permission(&global(), "anything"), Tristate::Undefined);
    let parents: Vec<String> = view.get_parents(&global()).iter().map(|g| g.name().to_owned()).collect();
    assert_eq!(parents, vec!["y".to_owned()]);
    assert!(view.is_child_of(&global(), &y));
}

#[test]
fn collection_defaults_suffix_beats_service_defaults() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    registry
        .collection_defaults(SubjectKind::Group)
        .subject_data()
        .set_node(NodeBuilder::suffix(1, "!").build().unwrap());
    registry
        .service_defaults()
        .subject_data()
        .set_node(NodeBuilder::suffix(999, "?").build().unwrap());

    assert_eq!(engine.subject(g.as_ref()).get_option(&global(), "suffix").as_deref(), Some("!"));
}

#[test]
fn service_defaults_answer_last() {
    let (registry, engine) = setup();
    let user = registry.insert_user(User::new(Uuid::new_v4()).with_name("alice"));
    registry.service_defaults().subject_data().set_permission(&global(), "chat", Tristate::True).unwrap();
    registry.service_defaults().subject_data().add_parent(&global(), "default").unwrap();

    let view = engine.subject(user.as_ref());
    assert!(view.has_permission(&global(), "chat"));
    let parents: Vec<String> = view.get_parents(&global()).iter().map(|g| g.name().to_owned()).collect();
    assert_eq!(parents, vec!["default".to_owned()]);
}

#[test]
fn meta_values_round_trip_through_escaping() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    g.subject_data().set_option(&global(), "motd", Some("v1.2 / $5")).unwrap();
    assert_eq!(engine.subject(g.as_ref()).get_option(&global(), "motd").as_deref(), Some("v1.2 / $5"));
}

#[test]
fn context_scoped_nodes_only_apply_in_context() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    g.subject_data()
        .set_node(NodeBuilder::new("build").server("creative").world("nether").build().unwrap());

    let view = engine.subject(g.as_ref());
    let creative = ContextSet::singleton("server", "creative");
    let nether = creative.clone().with("world", "nether");
    assert!(!view.has_permission(&global(), "build"));
    assert!(!view.has_permission(&creative, "build"));
    assert!(view.has_permission(&nether, "build"));
    assert!(view.active_contexts().is_empty());
}

#[test]
fn transient_nodes_override_persistent() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");
    g.subject_data().set_permission(&global(), "fly", Tristate::True).unwrap();
    g.transient_data().set_permission(&global(), "fly", Tristate::False).unwrap();
    g.transient_data().set_option(&global(), "rank", Some("temp")).unwrap();
    g.subject_data().set_option(&global(), "rank", Some("saved")).unwrap();

    let view = engine.subject(g.as_ref());
    assert_eq!(view.get_permission(&global(), "fly"), Tristate::False);
    assert_eq!(view.get_option(&global(), "rank").as_deref(), Some("temp"));
}

#[test]
fn readers_see_whole_snapshots_under_concurrent_writes() {
    let (registry, engine) = setup();
    let g = registry.insert_group("g");

    thread::scope(|s| {
        let writer = s.spawn(|| {
            for i in 0..200 {
                let nodes = vec![
                    NodeBuilder::new("a").value(i % 2 == 0).build().unwrap(),
                    NodeBuilder::new("b").value(i % 2 == 0).build().unwrap(),
                ];
                g.subject_data().replace_nodes(nodes);
            }
        });
        for _ in 0..200 {
            let nodes = g.subject_data().nodes();
            if nodes.len() == 2 {
                assert_eq!(nodes[0].value(), nodes[1].value());
            }
            let _ = engine.subject(g.as_ref()).get_permission(&global(), "a");
        }
        writer.join().unwrap();
    });
}
