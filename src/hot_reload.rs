//! Directory change notifications for shader hot reload.
//!
//! [`DirMonitor`] watches a directory tree with `notify`. The watcher's
//! callback runs on notify's own worker thread and appends normalized
//! [`DirEvent`]s to a buffer behind a mutex. The render thread drains that
//! buffer once per frame through [`ChangeFeed::poll`], which only ever
//! *tries* the lock: if the worker is mid-append, the frame sees no events
//! and the next frame picks them up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::fs::normalize;

/// What happened to a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirEventKind {
    Create,
    Delete,
    Move,
    Modify,
}

/// A change to a file below the watched root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEvent {
    pub kind: DirEventKind,
    /// Path relative to the watched root, `/`-separated.
    pub path: String,
}

impl DirEvent {
    pub fn modify(path: impl Into<String>) -> Self {
        Self {
            kind: DirEventKind::Modify,
            path: path.into(),
        }
    }
}

/// A source of file change events, drained once per frame.
pub trait ChangeFeed {
    /// Returns every event observed since the previous call. Never blocks.
    fn poll(&mut self) -> Vec<DirEvent>;
}

/// A feed that never reports anything. Used when hot reload is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFeed;

impl ChangeFeed for NullFeed {
    fn poll(&mut self) -> Vec<DirEvent> {
        Vec::new()
    }
}

/// Watches a directory tree for changes.
pub struct DirMonitor {
    root: PathBuf,
    events: Arc<Mutex<Vec<DirEvent>>>,
    // Dropping the watcher stops its worker thread.
    _watcher: RecommendedWatcher,
}

impl DirMonitor {
    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFile`] if `root` does not exist and
    /// [`Error::Library`] if the OS watcher cannot be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(Error::missing_file(root, None));
        }
        // notify reports absolute, canonical paths on some platforms.
        let base = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let strip = base.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    // Path resolution touches the filesystem; keep it outside the lock.
                    let batch = translate(&strip, &event);
                    if !batch.is_empty() {
                        sink.lock().extend(batch);
                    }
                }
                Err(err) => log::warn!("directory monitor error: {err}"),
            },
        )?;
        watcher.watch(&base, RecursiveMode::Recursive)?;

        log::debug!("watching '{}' for changes", base.display());

        Ok(Self {
            root: base,
            events,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ChangeFeed for DirMonitor {
    fn poll(&mut self) -> Vec<DirEvent> {
        match self.events.try_lock() {
            Some(mut buffer) => buffer.drain(..).collect(),
            None => Vec::new(),
        }
    }
}

fn classify(kind: &EventKind) -> Option<DirEventKind> {
    match kind {
        EventKind::Create(_) => Some(DirEventKind::Create),
        EventKind::Remove(_) => Some(DirEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => Some(DirEventKind::Move),
        EventKind::Modify(_) => Some(DirEventKind::Modify),
        _ => None,
    }
}

fn translate(base: &Path, event: &notify::Event) -> Vec<DirEvent> {
    let Some(kind) = classify(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .filter_map(|path| relative_to(base, path))
        .map(|path| DirEvent { kind, path })
        .collect()
}

fn relative_to(base: &Path, path: &Path) -> Option<String> {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let rel = path.strip_prefix(base).ok()?;
    Some(normalize(&rel.to_string_lossy()))
}
