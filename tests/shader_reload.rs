mod common;

use common::{BROKEN, Event, Loaded, MemorySource, RecordingBackend, ScriptedFeed, sample_assets};
use kiln::hot_reload::{DirEvent, DirEventKind, NullFeed};
use kiln::{ErrorKind, ReloadReport, ShaderManager, ShaderStage};

fn pipeline_serial(loaded: &Loaded, technique: &str) -> usize {
    loaded.techniques.lookup(technique).unwrap().pipeline().serial
}

fn module_serial(loaded: &Loaded, shader: &str) -> usize {
    let id = loaded.shaders.lookup(shader).unwrap();
    loaded.shaders.module(id).unwrap().serial
}

#[test]
fn open_is_cached_by_name() {
    let backend = RecordingBackend::new();
    let files = MemorySource::new().with("shaders/a.vert", "vertex a");
    let mut shaders = ShaderManager::new(files.shared(), Box::new(NullFeed), "shaders");

    let first = shaders.open(&backend, "a.vert", ShaderStage::Vertex).unwrap();
    let second = shaders.open(&backend, "a.vert", ShaderStage::Vertex).unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.compiles.get(), 1);
    assert_eq!(shaders.len(), 1);

    let err = shaders
        .open(&backend, "a.vert", ShaderStage::Fragment)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUsage);
    assert_eq!(backend.compiles.get(), 1);
}

#[test]
fn failed_open_caches_nothing() {
    let backend = RecordingBackend::new();
    let files = MemorySource::new().with("shaders/bad.frag", BROKEN);
    let mut shaders = ShaderManager::new(files.shared(), Box::new(NullFeed), "shaders/");

    let err = shaders
        .open(&backend, "bad.frag", ShaderStage::Fragment)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidShader);
    assert!(err.to_string().contains("expected declaration"));

    let err = shaders
        .open(&backend, "nope.frag", ShaderStage::Fragment)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);
    assert!(shaders.is_empty());

    // A later open retries from scratch.
    files.set("shaders/bad.frag", "fragment fixed");
    shaders
        .open(&backend, "bad.frag", ShaderStage::Fragment)
        .unwrap();
    assert_eq!(shaders.len(), 1);
}

#[test]
fn shared_shaders_compile_once_across_techniques() {
    let backend = RecordingBackend::new();
    let loaded = Loaded::open(&backend, &sample_assets(), Box::new(NullFeed)).unwrap();
    // a.vert, a.frag, b.frag
    assert_eq!(backend.compiles.get(), 3);
    assert_eq!(backend.pipelines.get(), 2);
    assert_eq!(
        loaded.techniques.lookup("tri").unwrap().vert(),
        loaded.techniques.lookup("other").unwrap().vert()
    );
}

#[test]
fn reload_rebuilds_only_dependent_techniques() {
    let backend = RecordingBackend::new();
    let files = sample_assets();
    let feed = ScriptedFeed::new();
    let mut loaded = Loaded::open(&backend, &files, feed.boxed()).unwrap();
    let tri = pipeline_serial(&loaded, "tri");
    let other = pipeline_serial(&loaded, "other");
    let old_module = module_serial(&loaded, "b.frag");

    files.set("shaders/b.frag", "fragment b, edited");
    feed.push(vec![DirEvent::modify("b.frag")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);

    assert_eq!(
        report,
        ReloadReport {
            shaders: 1,
            rebuilt: 1,
            failed: 0
        }
    );
    assert_eq!(backend.compiles.get(), 4);
    assert_eq!(pipeline_serial(&loaded, "tri"), tri);
    assert_ne!(pipeline_serial(&loaded, "other"), other);

    let new_module = module_serial(&loaded, "b.frag");
    assert_ne!(new_module, old_module);
    assert_eq!(
        loaded.techniques.lookup("other").unwrap().pipeline().fragment,
        new_module
    );
    assert_eq!(backend.count(|e| *e == Event::WaitIdle), 1);
}

#[test]
fn reload_of_a_shared_shader_rebuilds_every_user() {
    let backend = RecordingBackend::new();
    let files = sample_assets();
    let feed = ScriptedFeed::new();
    let mut loaded = Loaded::open(&backend, &files, feed.boxed()).unwrap();
    let tri = pipeline_serial(&loaded, "tri");
    let other = pipeline_serial(&loaded, "other");

    // Paths relative to the asset root are matched too.
    feed.push(vec![DirEvent::modify("shaders/a.vert")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);

    assert_eq!(report.rebuilt, 2);
    assert_ne!(pipeline_serial(&loaded, "tri"), tri);
    assert_ne!(pipeline_serial(&loaded, "other"), other);
    // Unchanged fixed-function state survives the rebuild.
    assert!(!loaded.techniques.lookup("other").unwrap().pipeline().cull);
}

#[test]
fn failed_reload_keeps_last_good_state() {
    let backend = RecordingBackend::new();
    let files = sample_assets();
    let feed = ScriptedFeed::new();
    let mut loaded = Loaded::open(&backend, &files, feed.boxed()).unwrap();
    let other = pipeline_serial(&loaded, "other");
    let module = module_serial(&loaded, "b.frag");

    files.set("shaders/b.frag", BROKEN);
    feed.push(vec![DirEvent::modify("b.frag")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);

    assert_eq!(report.failed, 1);
    assert_eq!(report.shaders, 0);
    assert_eq!(pipeline_serial(&loaded, "other"), other);
    assert_eq!(module_serial(&loaded, "b.frag"), module);
    assert_eq!(backend.count(|e| *e == Event::WaitIdle), 0);

    // The next change retries.
    files.set("shaders/b.frag", "fragment b, fixed");
    feed.push(vec![DirEvent::modify("b.frag")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);
    assert_eq!(report.shaders, 1);
    assert_ne!(pipeline_serial(&loaded, "other"), other);
}

#[test]
fn failed_pipeline_rebuild_swaps_nothing() {
    let backend = RecordingBackend::new();
    let files = sample_assets();
    let feed = ScriptedFeed::new();
    let mut loaded = Loaded::open(&backend, &files, feed.boxed()).unwrap();
    let tri = pipeline_serial(&loaded, "tri");
    let other = pipeline_serial(&loaded, "other");
    let module = module_serial(&loaded, "a.vert");

    // a.vert compiles, but the second technique using it cannot be rebuilt.
    files.set("shaders/a.vert", "vertex a, edited");
    *backend.fail_pipeline.borrow_mut() = Some("other".to_owned());
    feed.push(vec![DirEvent::modify("a.vert")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);

    assert_eq!(
        report,
        ReloadReport {
            shaders: 0,
            rebuilt: 0,
            failed: 1
        }
    );
    assert_eq!(module_serial(&loaded, "a.vert"), module);
    assert_eq!(pipeline_serial(&loaded, "tri"), tri);
    assert_eq!(pipeline_serial(&loaded, "other"), other);
    assert_eq!(backend.count(|e| *e == Event::WaitIdle), 0);

    *backend.fail_pipeline.borrow_mut() = None;
    feed.push(vec![DirEvent::modify("a.vert")]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);
    assert_eq!(report.rebuilt, 2);
    assert_ne!(module_serial(&loaded, "a.vert"), module);
    assert_ne!(pipeline_serial(&loaded, "tri"), tri);
}

#[test]
fn only_modify_events_on_cached_shaders_trigger_reload() {
    let backend = RecordingBackend::new();
    let feed = ScriptedFeed::new();
    let mut loaded = Loaded::open(&backend, &sample_assets(), feed.boxed()).unwrap();
    let compiles = backend.compiles.get();

    feed.push(vec![
        DirEvent {
            kind: DirEventKind::Create,
            path: "a.frag".into(),
        },
        DirEvent {
            kind: DirEventKind::Delete,
            path: "b.frag".into(),
        },
        DirEvent::modify("unused.frag"),
        DirEvent::modify("a.frag"),
        DirEvent::modify("a.frag"),
    ]);
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);

    assert_eq!(report.shaders, 1);
    assert_eq!(backend.compiles.get(), compiles + 1);

    // Nothing new on the feed.
    let report = loaded
        .shaders
        .reload_check(&backend, &mut loaded.techniques);
    assert!(report.is_empty());
}
