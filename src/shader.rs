//! Named shader modules, compiled once and hot-reloaded on change.
//!
//! [`ShaderManager`] turns shader source files under the shader directory into
//! backend modules, caching them by file name. Once per frame,
//! [`ShaderManager::reload_check`] drains the change feed; for every modified
//! file that matches a cached shader it recompiles the module and asks the
//! shader's dependents (techniques) to rebuild their pipelines.
//!
//! A reload is all-or-nothing. The new module and every replacement pipeline
//! are built first; only when all of them succeed does the manager wait for
//! the device to go idle and swap them in together. Any failure is logged and
//! the previous module and pipelines stay in use.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::fs::{self, FileSource};
use crate::hot_reload::{ChangeFeed, DirEventKind};

/// Pipeline stage a shader is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable handle to a cached shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) usize);

pub struct Shader<B: Backend> {
    name: String,
    stage: ShaderStage,
    module: B::ShaderModule,
}

impl<B: Backend> Shader<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn module(&self) -> &B::ShaderModule {
        &self.module
    }
}

/// Something whose GPU objects embed shader modules and must be rebuilt
/// when one of them changes.
///
/// Rebuilding is split in two so a reload can be abandoned without side
/// effects: `stage_rebuild` builds replacements from the candidate module and
/// must not modify `self`; `commit_rebuild` installs them.
pub trait ShaderDependents<B: Backend> {
    type Staged;

    fn stage_rebuild(
        &self,
        backend: &B,
        shaders: &ShaderManager<B>,
        changed: ShaderId,
        replacement: &B::ShaderModule,
    ) -> Result<Self::Staged>;

    /// Installs staged replacements, returning how many objects were rebuilt.
    fn commit_rebuild(&mut self, staged: Self::Staged) -> usize;
}

/// Outcome of one [`ShaderManager::reload_check`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub shaders: usize,
    pub rebuilt: usize,
    pub failed: usize,
}

impl ReloadReport {
    pub fn is_empty(&self) -> bool {
        self.shaders == 0 && self.failed == 0
    }
}

pub struct ShaderManager<B: Backend> {
    shaders: Vec<Shader<B>>,
    by_name: HashMap<String, ShaderId>,
    files: Arc<dyn FileSource>,
    feed: Box<dyn ChangeFeed>,
    dir: String,
}

impl<B: Backend> ShaderManager<B> {
    /// Creates an empty manager loading sources from `dir` within `files`.
    ///
    /// `feed` reports changes relative to either the shader directory or the
    /// root of `files`; both forms are matched.
    pub fn new(
        files: Arc<dyn FileSource>,
        feed: Box<dyn ChangeFeed>,
        dir: impl Into<String>,
    ) -> Self {
        let dir: String = dir.into();
        Self {
            shaders: Vec::new(),
            by_name: HashMap::new(),
            files,
            feed,
            dir: fs::normalize(&dir).trim_end_matches('/').to_owned(),
        }
    }

    /// Returns the cached shader called `name`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingFile`] if the source cannot be found
    /// - [`Error::InvalidShader`] with the compiler diagnostics if it fails to compile
    /// - [`Error::InvalidUsage`] if `name` is already cached for another stage
    ///
    /// A failed open caches nothing.
    pub fn open(&mut self, backend: &B, name: &str, stage: ShaderStage) -> Result<ShaderId> {
        if let Some(&id) = self.by_name.get(name) {
            let cached = self.shaders[id.0].stage;
            if cached != stage {
                return Err(Error::InvalidUsage(format!(
                    "shader '{name}' is a {cached} shader, requested as {stage}"
                )));
            }
            return Ok(id);
        }

        let source = self.files.load(&fs::join(&self.dir, name))?;
        let module = backend.create_shader_module(name, stage, &source)?;
        log::debug!("compiled {stage} shader '{name}'");

        let id = ShaderId(self.shaders.len());
        self.shaders.push(Shader {
            name: name.to_owned(),
            stage,
            module,
        });
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<ShaderId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ShaderId) -> Option<&Shader<B>> {
        self.shaders.get(id.0)
    }

    pub fn module(&self, id: ShaderId) -> Option<&B::ShaderModule> {
        self.get(id).map(Shader::module)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Drains the change feed and reloads every modified cached shader.
    ///
    /// Never fails: a shader that no longer compiles, or whose dependents
    /// cannot be rebuilt, is logged and left as it was.
    pub fn reload_check<D>(&mut self, backend: &B, dependents: &mut D) -> ReloadReport
    where
        D: ShaderDependents<B>,
    {
        let mut report = ReloadReport::default();
        let mut seen = HashSet::new();

        let events = self.feed.poll();
        for event in events {
            if event.kind != DirEventKind::Modify {
                continue;
            }
            let Some(id) = self.shader_for_path(&event.path) else {
                continue;
            };
            // Editors often emit several writes per save.
            if !seen.insert(id) {
                continue;
            }

            match self.reload(backend, id, dependents) {
                Ok(rebuilt) => {
                    log::info!(
                        "reloaded shader '{}' ({rebuilt} dependent(s) rebuilt)",
                        self.shaders[id.0].name
                    );
                    report.shaders += 1;
                    report.rebuilt += rebuilt;
                }
                Err(err) => {
                    log::warn!(
                        "keeping previous version of shader '{}': {err}",
                        self.shaders[id.0].name
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn reload<D>(&mut self, backend: &B, id: ShaderId, dependents: &mut D) -> Result<usize>
    where
        D: ShaderDependents<B>,
    {
        let shader = &self.shaders[id.0];
        let source = self.files.load(&fs::join(&self.dir, &shader.name))?;
        let module = backend.create_shader_module(&shader.name, shader.stage, &source)?;
        let staged = dependents.stage_rebuild(backend, self, id, &module)?;

        // Pipelines still in flight may reference the old module.
        backend.wait_idle()?;

        self.shaders[id.0].module = module;
        Ok(dependents.commit_rebuild(staged))
    }

    fn shader_for_path(&self, path: &str) -> Option<ShaderId> {
        let path = fs::normalize(path);
        if let Some(&id) = self.by_name.get(&path) {
            return Some(id);
        }
        let prefix = format!("{}/", self.dir);
        path.strip_prefix(&prefix)
            .and_then(|rest| self.by_name.get(rest))
            .copied()
    }

    /// Destroys every cached module.
    pub fn close(self) {
        log::debug!("closing shader manager ({} shader(s))", self.shaders.len());
    }
}
