//! Techniques: a vertex and fragment shader baked into a graphics pipeline.
//!
//! Techniques are declared in the technique document, one entry per
//! technique:
//!
//! ```text
//! {
//!     "tri": (vert: "mesh.vert.wgsl", frag: "mesh.frag.wgsl"),
//!     "sky": (vert: "sky.vert.wgsl", frag: "sky.frag.wgsl", cull: false, depth: false),
//! }
//! ```
//!
//! `cull` (back faces) and `depth` (less-test with writes) default to `true`.
//! Every other piece of fixed-function state is shared by all techniques:
//! triangle lists, dynamic viewport and scissor, no blending.

use std::collections::HashMap;

use serde::Deserialize;

use crate::backend::{Backend, FixedFunctionState, PassFormat, PipelineDesc};
use crate::document::Table;
use crate::error::{EntryKind, Error, Result};
use crate::shader::{ShaderDependents, ShaderId, ShaderManager, ShaderStage};

/// One entry of the technique document.
///
/// `vert` and `frag` are optional here so a missing one is reported against
/// the technique's name instead of as a bare syntax error.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TechniqueDesc {
    pub vert: Option<String>,
    pub frag: Option<String>,
    #[serde(default = "enabled")]
    pub cull: bool,
    #[serde(default = "enabled")]
    pub depth: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TechniqueId(pub(crate) usize);

pub struct Technique<B: Backend> {
    name: String,
    vert: ShaderId,
    frag: ShaderId,
    state: FixedFunctionState,
    pipeline: B::Pipeline,
}

impl<B: Backend> Technique<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vert(&self) -> ShaderId {
        self.vert
    }

    pub fn frag(&self) -> ShaderId {
        self.frag
    }

    pub fn state(&self) -> FixedFunctionState {
        self.state
    }

    pub fn pipeline(&self) -> &B::Pipeline {
        &self.pipeline
    }

    /// Whether `shader` is this technique's vertex or fragment shader.
    pub fn uses(&self, shader: ShaderId) -> bool {
        self.vert == shader || self.frag == shader
    }
}

pub struct TechniqueManager<B: Backend> {
    techniques: Vec<Technique<B>>,
    by_name: HashMap<String, TechniqueId>,
}

impl<B: Backend> Default for TechniqueManager<B> {
    fn default() -> Self {
        Self {
            techniques: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<B: Backend> TechniqueManager<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every technique declared in `table`, in document order.
    ///
    /// Shaders are opened through `shaders`, so a shader shared by several
    /// techniques is compiled once. A technique whose name is already loaded
    /// is rebuilt in place and keeps its id.
    ///
    /// The first failing entry aborts the call. Techniques built earlier in
    /// the same call stay loaded.
    ///
    /// Returns the number of techniques built.
    pub fn open(
        &mut self,
        backend: &B,
        shaders: &mut ShaderManager<B>,
        table: &Table<TechniqueDesc>,
    ) -> Result<usize> {
        let pass = PassFormat::gbuffer(backend.surface().color_format);
        let mut count = 0;

        for (name, entry) in table.iter() {
            let vert_name = required(name, entry.vert.as_deref(), "vert")?;
            let frag_name = required(name, entry.frag.as_deref(), "frag")?;
            let state = FixedFunctionState {
                cull: entry.cull,
                depth: entry.depth,
            };

            let vert = shaders.open(backend, vert_name, ShaderStage::Vertex)?;
            let frag = shaders.open(backend, frag_name, ShaderStage::Fragment)?;
            let pipeline = build_pipeline(backend, shaders, name, vert, frag, state, pass, None)?;

            let technique = Technique {
                name: name.to_owned(),
                vert,
                frag,
                state,
                pipeline,
            };
            match self.by_name.get(name) {
                Some(&id) => self.techniques[id.0] = technique,
                None => {
                    self.by_name
                        .insert(name.to_owned(), TechniqueId(self.techniques.len()));
                    self.techniques.push(technique);
                }
            }
            log::debug!("loaded technique '{name}' ({vert_name}, {frag_name})");
            count += 1;
        }

        Ok(count)
    }

    /// Looks up a technique by name. `None` means "not ready to draw".
    pub fn lookup(&self, name: &str) -> Option<&Technique<B>> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn id(&self, name: &str) -> Option<TechniqueId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TechniqueId) -> Option<&Technique<B>> {
        self.techniques.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TechniqueId, &Technique<B>)> {
        self.techniques
            .iter()
            .enumerate()
            .map(|(i, t)| (TechniqueId(i), t))
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }
}

impl<B: Backend> ShaderDependents<B> for TechniqueManager<B> {
    type Staged = Vec<(TechniqueId, B::Pipeline)>;

    fn stage_rebuild(
        &self,
        backend: &B,
        shaders: &ShaderManager<B>,
        changed: ShaderId,
        replacement: &B::ShaderModule,
    ) -> Result<Self::Staged> {
        let pass = PassFormat::gbuffer(backend.surface().color_format);
        self.iter()
            .filter(|(_, technique)| technique.uses(changed))
            .map(|(id, t)| {
                let pipeline = build_pipeline(
                    backend,
                    shaders,
                    &t.name,
                    t.vert,
                    t.frag,
                    t.state,
                    pass,
                    Some((changed, replacement)),
                )?;
                Ok((id, pipeline))
            })
            .collect()
    }

    fn commit_rebuild(&mut self, staged: Self::Staged) -> usize {
        let count = staged.len();
        for (id, pipeline) in staged {
            let technique = &mut self.techniques[id.0];
            // The old pipeline and its layouts are released here.
            technique.pipeline = pipeline;
            log::debug!("rebuilt technique '{}'", technique.name);
        }
        count
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pipeline<B: Backend>(
    backend: &B,
    shaders: &ShaderManager<B>,
    name: &str,
    vert: ShaderId,
    frag: ShaderId,
    state: FixedFunctionState,
    pass: PassFormat,
    replacement: Option<(ShaderId, &B::ShaderModule)>,
) -> Result<B::Pipeline> {
    let module = |id: ShaderId| match replacement {
        Some((changed, module)) if changed == id => Some(module),
        _ => shaders.module(id),
    };
    let unknown =
        || Error::InvalidUsage(format!("technique '{name}' references an unknown shader"));

    backend.create_pipeline(&PipelineDesc {
        label: name,
        vertex: module(vert).ok_or_else(unknown)?,
        fragment: module(frag).ok_or_else(unknown)?,
        state,
        pass,
    })
}

fn required<'a>(technique: &str, shader: Option<&'a str>, key: &str) -> Result<&'a str> {
    shader.ok_or_else(|| {
        Error::entry(EntryKind::Technique, technique, format!("missing key '{key}'"))
    })
}
