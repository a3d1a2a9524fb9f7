mod common;

use common::{Event, RecordingBackend, ScriptedFeed, sample_assets};
use kiln::hot_reload::{DirEvent, NullFeed};
use kiln::{Camera, EngineConfig, ErrorKind, MeshData, Renderer, Transform};

fn config() -> EngineConfig {
    EngineConfig::new()
}

fn boot() -> Renderer<RecordingBackend> {
    Renderer::boot(
        RecordingBackend::new(),
        &config(),
        sample_assets().shared(),
        Box::new(NullFeed),
    )
    .unwrap()
}

#[test]
fn boot_builds_the_default_graph() {
    let renderer = boot();
    let graph = renderer.graph();
    assert_eq!(graph.pass_count(), 1);
    assert!(!graph.is_dirty());
    assert_eq!(graph.pass_label(graph.baked_order()[0]), Some("gbuffer"));
    assert_eq!(renderer.techniques().len(), 2);
    assert_eq!(renderer.effects().len(), 2);
    assert_eq!(renderer.materials().len(), 2);
    assert!(renderer.material("red").is_some());
}

#[test]
fn frame_draws_every_queued_mesh_once() {
    let mut renderer = boot();
    renderer.set_camera(Some(Camera::new().at(0.0, 0.0, 5.0)));
    let cube = renderer.create_mesh(&MeshData::cube()).unwrap();
    let red = renderer.material("red").unwrap();
    let mesh_serial = renderer.meshes().get(cube).unwrap().serial;

    for x in 0..3 {
        renderer.draw_mesh(cube, Transform::new().position([x as f32, 0.0, 0.0].into()), red);
    }
    assert_eq!(renderer.queued_draws(), 3);
    renderer.draw_frame().unwrap();
    assert_eq!(renderer.queued_draws(), 0);

    let mut expected = vec![
        Event::BeginFrame { slot: 0, image: 0 },
        Event::BeginPass("gbuffer".into()),
        Event::UploadCamera,
        Event::BindTechnique("tri".into()),
        Event::BindFrameResources("tri".into()),
    ];
    for _ in 0..3 {
        expected.push(Event::BindMaterial("red/gbuffer".into()));
        expected.push(Event::PushModel);
        expected.push(Event::Draw(mesh_serial));
    }
    expected.push(Event::EndPass("gbuffer".into()));
    expected.push(Event::EndFrame { slot: 0 });
    assert_eq!(renderer.backend().take_events(), expected);

    // Nothing re-queued: the next frame records an empty pass.
    renderer.draw_frame().unwrap();
    assert_eq!(renderer.backend().count(|e| matches!(e, Event::Draw(_))), 0);
}

#[test]
fn technique_is_rebound_only_when_it_changes() {
    let mut renderer = boot();
    renderer.set_camera(Some(Camera::new()));
    let cube = renderer.create_mesh(&MeshData::cube()).unwrap();
    let red = renderer.material("red").unwrap();
    let blue = renderer.material("blue").unwrap();

    renderer.draw_mesh(cube, Transform::new(), red);
    renderer.draw_mesh(cube, Transform::new(), red);
    renderer.draw_mesh(cube, Transform::new(), blue);
    renderer.draw_frame().unwrap();

    let binds: Vec<_> = renderer
        .backend()
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, Event::BindTechnique(_)))
        .collect();
    assert_eq!(
        binds,
        [
            Event::BindTechnique("tri".into()),
            Event::BindTechnique("other".into())
        ]
    );
}

#[test]
fn nothing_is_drawn_without_a_camera() {
    let mut renderer = boot();
    let cube = renderer.create_mesh(&MeshData::cube()).unwrap();
    let red = renderer.material("red").unwrap();
    renderer.draw_mesh(cube, Transform::new(), red);
    renderer.draw_frame().unwrap();

    let backend = renderer.backend();
    assert_eq!(backend.count(|e| *e == Event::UploadCamera), 0);
    assert_eq!(backend.count(|e| matches!(e, Event::Draw(_))), 0);
    assert_eq!(backend.count(|e| matches!(e, Event::EndFrame { .. })), 1);
    assert_eq!(renderer.queued_draws(), 0);
}

#[test]
fn frame_slots_advance_modulo_frames_in_flight() {
    let mut renderer = boot();
    let mut slots = Vec::new();
    for _ in 0..5 {
        slots.push(renderer.frame_slot());
        renderer.draw_frame().unwrap();
    }
    assert_eq!(slots, [0, 1, 0, 1, 0]);
}

#[test]
fn out_of_date_surface_skips_the_frame_and_rebuilds() {
    let mut renderer = boot();
    renderer.set_camera(Some(Camera::new()));
    renderer.draw_frame().unwrap();
    let textures = renderer.backend().textures.get();
    renderer.backend().take_events();

    let cube = renderer.create_mesh(&MeshData::cube()).unwrap();
    let red = renderer.material("red").unwrap();
    renderer.draw_mesh(cube, Transform::new(), red);
    renderer.backend().outdated.set(true);
    renderer.draw_frame().unwrap();

    assert!(renderer.backend().take_events().is_empty());
    assert_eq!(renderer.queued_draws(), 0);
    assert_eq!(renderer.backend().textures.get(), textures + 1);
    assert_eq!(renderer.frame_slot(), 1);
}

#[test]
fn resize_recreates_graph_targets() {
    let mut renderer = boot();
    renderer.draw_frame().unwrap();
    assert_eq!(renderer.backend().textures.get(), 1);

    renderer.resize(0, 0).unwrap();
    assert_eq!(renderer.backend().textures.get(), 1);

    renderer.resize(1024, 768).unwrap();
    assert_eq!(renderer.backend().textures.get(), 2);
    assert_eq!(renderer.backend().extent.width, 1024);
}

#[test]
fn draw_frame_runs_the_reload_check() {
    let files = sample_assets();
    let feed = ScriptedFeed::new();
    let mut renderer =
        Renderer::boot(RecordingBackend::new(), &config(), files.shared(), feed.boxed()).unwrap();

    files.set("shaders/a.frag", "fragment a, edited");
    feed.push(vec![DirEvent::modify("a.frag")]);
    let report = renderer.draw_frame().unwrap();
    assert_eq!(report.shaders, 1);
    assert_eq!(report.rebuilt, 1);

    // The idle wait happens before the frame is begun.
    let events = renderer.backend().take_events();
    assert_eq!(events[0], Event::WaitIdle);
    assert!(matches!(events[1], Event::BeginFrame { .. }));
}

#[test]
fn boot_failures_keep_their_kind() {
    let missing = sample_assets();
    let err = Renderer::boot(
        RecordingBackend::new(),
        &config().frames_in_flight(2),
        std::sync::Arc::new(kiln::fs::DiskSource::new("/definitely/not/here")),
        Box::new(NullFeed),
    );
    assert_eq!(err.err().map(|e| e.kind()), Some(ErrorKind::MissingFile));

    missing.set("shaders/a.frag", common::BROKEN);
    let err = Renderer::boot(
        RecordingBackend::new(),
        &config(),
        missing.shared(),
        Box::new(NullFeed),
    );
    assert_eq!(err.err().map(|e| e.kind()), Some(ErrorKind::InvalidShader));

    let dangling = sample_assets().with("effects.ron", r#"{ "solid": (gbuffer: "missing") }"#);
    let err = Renderer::boot(
        RecordingBackend::new(),
        &config(),
        dangling.shared(),
        Box::new(NullFeed),
    );
    assert_eq!(err.err().map(|e| e.kind()), Some(ErrorKind::FailedParse));
}
