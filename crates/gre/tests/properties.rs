use gre::{
    event::{CustomEvent, EventPayload, EventType},
    graphics::{HeadlessBackend, ProgramManager, Renderer, ShaderType},
    handle::{Holder, User},
    manager::{LoaderOptions, Manager},
    resource::GenericListener,
    scene::{LightingMode, RenderNode, RenderScene, Technique},
    technique_parser::{convert_tree, parse_tree, TechniqueFileParser},
    window::{HeadlessWindowLoader, Window},
    HasProceeder, Resource,
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn resource_is_destroyed_once_with_its_last_holder() {
    let drops = Arc::new(AtomicUsize::new(0));
    let first = Holder::new(DropCounter(drops.clone()));

    let mut holders = vec![first.clone(), first.clone()];
    holders.push(holders[1].clone());
    drop(first);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    while holders.len() > 1 {
        holders.remove(0);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    let mut last = holders.pop().unwrap();
    last.release();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    drop(last);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn users_lock_only_while_the_resource_lives() {
    let holder = Holder::new_resource(GenericListener::new("resource"));
    let user = holder.user();

    let locked = user.lock();
    assert!(!locked.is_invalid());
    assert!(locked.ptr_eq(&holder));
    assert!(holder.same_counter(&user));
    assert_eq!(holder.counter().holders, 2);

    drop(locked);
    drop(holder);
    assert!(user.lock().is_invalid());
    assert!(user.is_expired());
    assert!(User::<GenericListener>::null().lock().is_invalid());
}

#[test]
fn stopping_propagation_skips_later_listeners() {
    let emitter = Holder::new_resource(GenericListener::new("emitter"));
    let received = Arc::new(Mutex::new(vec![]));

    let listeners = ["L1", "L2", "L3"].map(|name| {
        let listener = Holder::new_resource(GenericListener::new(name));
        let sink = received.clone();
        let stops = name == "L2";
        listener.proceeder().add_action(EventType::Custom, move |event| {
            sink.lock().push(name);
            if stops {
                event.set_should_stop_propagating(true);
            }
        });
        emitter
            .proceeder()
            .add_listener(&listener.user().as_resource())
            .unwrap();
        listener
    });

    let event = emitter
        .proceeder()
        .emit(EventPayload::Custom(CustomEvent::default()));
    assert!(event.should_stop_propagating());
    assert_eq!(*received.lock(), vec!["L1", "L2"]);
    drop(listeners);
}

#[test]
fn destroyed_emitters_and_listeners_leave_the_graph() {
    let emitter = Holder::new_resource(GenericListener::new("emitter"));
    let listener = Holder::new_resource(GenericListener::new("listener"));
    listener
        .proceeder()
        .listen(&emitter.user().as_resource(), None)
        .unwrap();
    assert_eq!(emitter.proceeder().listener_count(), 1);

    drop(listener);
    assert_eq!(emitter.proceeder().listener_count(), 0);
    assert!(emitter.proceeder().get_listener("listener").is_invalid());

    let listener = Holder::new_resource(GenericListener::new("listener"));
    let unloaded = Arc::new(AtomicUsize::new(0));
    let sink = unloaded.clone();
    listener
        .proceeder()
        .add_action(EventType::ResourceUnloaded, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
    let weak_emitter = emitter.user().as_resource();
    listener.proceeder().listen(&weak_emitter, None).unwrap();

    drop(emitter);
    assert_eq!(unloaded.load(Ordering::SeqCst), 1);
    assert!(weak_emitter.lock().is_invalid());
    listener.proceeder().unlisten(&weak_emitter);
    drop(listener);
}

#[test]
fn managers_reject_duplicate_names() {
    let windows = Holder::new_resource(Manager::<Window>::new("windows"));
    windows.register_loader("Headless", HeadlessWindowLoader);

    let first = windows.load("main", &LoaderOptions::new().with("Window.Title", "First"));
    let second = windows.load("main", &LoaderOptions::new().with("Window.Title", "Second"));

    assert!(!first.is_invalid());
    assert!(second.is_invalid());
    assert_eq!(windows.len(), 1);
    assert_eq!(windows.get("main").lock().title(), "First");
    assert!(windows.try_load("main", &LoaderOptions::new()).is_err());
}

const SAMPLE: &str = r#"[Program p]{[Vertex]{[GLSL "v.glsl"]}[Fragment]{[GLSL "f.glsl"]}}[Technique t]{[Program p][LightingMode none]}"#;

#[test]
fn technique_file_declarations_are_read() {
    let context = parse_tree(SAMPLE).and_then(|root| convert_tree(&root)).unwrap();

    assert_eq!(context.programs.len(), 1);
    let program = context.program("p").unwrap();
    let vertex = program.shaders.get(ShaderType::Vertex).unwrap();
    assert_eq!(vertex.len(), 1);
    assert_eq!(vertex.get("GLSL"), Some("v.glsl"));
    let fragment = program.shaders.get(ShaderType::Fragment).unwrap();
    assert_eq!(fragment.get("GLSL"), Some("f.glsl"));

    assert_eq!(context.techniques.len(), 1);
    let technique = context.technique("t").unwrap();
    assert_eq!(technique.program.as_deref(), Some("p"));
    assert_eq!(technique.lighting_mode, LightingMode::None);

    let renderer = Holder::new_resource(Renderer::new(
        "renderer",
        Box::new(HeadlessBackend::new()),
    ));
    let programs = ProgramManager::new();
    programs.set_renderer(renderer.user());
    programs.set_source_reader(|path| Ok(format!("// {}", path.display())));
    let techniques = Holder::new_resource(Manager::<Technique>::techniques("techniques"));

    let created = TechniqueFileParser::process("sample", SAMPLE, &programs, &techniques);
    assert_eq!(created.len(), 1);
    assert!(techniques.get("t").lock().program().ptr_eq(&programs.get_program("p")));
}

/// root -> a -> b -> (c, d)
///           -> e
fn sample_scene() -> (Holder<RenderScene>, Vec<Holder<RenderNode>>) {
    let scene = Holder::new_resource(RenderScene::new("scene"));
    let nodes = ["root", "a", "b", "c", "d", "e"].map(|name| scene.create_node(name));
    assert!(scene.add_node(nodes[0].clone()));
    assert!(nodes[0].add_node(nodes[1].clone()));
    assert!(nodes[1].add_node(nodes[2].clone()));
    assert!(nodes[2].add_node(nodes[3].clone()));
    assert!(nodes[2].add_node(nodes[4].clone()));
    assert!(nodes[1].add_node(nodes[5].clone()));
    (scene, nodes.to_vec())
}

#[test]
fn node_removal_policies() {
    let (scene, nodes) = sample_scene();
    let before = scene.node_count();
    let subtree = 1 + nodes[2].count_descendants();
    assert_eq!(before, 6);

    assert!(scene.remove_node(&nodes[2]));
    assert_eq!(scene.node_count(), before - subtree);
    for removed in &nodes[2..5] {
        assert!(scene.find_holder(removed.identifier()).is_invalid());
    }

    let (scene, nodes) = sample_scene();
    assert!(scene.remove_node_no_children(&nodes[2]));
    assert_eq!(scene.node_count(), before - 1);
    assert!(scene.find_holder(nodes[2].identifier()).is_invalid());
    for orphan in &nodes[3..5] {
        assert!(orphan.parent().ptr_eq(&nodes[1]));
        assert!(scene.find_holder(orphan.identifier()).ptr_eq(orphan));
    }
}
