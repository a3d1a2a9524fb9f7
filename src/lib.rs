//! # kiln
//!
//! A small wgpu renderer built around a baked render graph and a layered
//! asset pipeline:
//!
//! ```text
//! shaders/*.wgsl ─▶ ShaderManager ─▶ TechniqueManager ─▶ EffectManager ─▶ MaterialManager
//!                        ▲               (pipelines)        (stage map)      (bindings)
//!                   DirMonitor
//! ```
//!
//! Techniques, effects and materials are described in RON documents
//! (`techs.ron`, `effects.ron`, `material.ron`). Shaders are recompiled and
//! their dependent pipelines rebuilt when a file changes on disk.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kiln::*;
//!
//! fn main() -> Result<()> {
//!     let config = EngineConfig::load_or_default("engine.ron")?;
//!     config.init_logging();
//!     run(
//!         config,
//!         |renderer| {
//!             renderer.set_camera(Some(Camera::new().at(0.0, 0.0, 5.0)));
//!             let cube = renderer.create_mesh(&MeshData::cube())?;
//!             Ok((cube, renderer.material("red")))
//!         },
//!         |(cube, red), frame| {
//!             if let Some(red) = *red {
//!                 frame.renderer.draw_mesh(*cube, Transform::new(), red);
//!             }
//!         },
//!     )
//! }
//! ```

mod app;
pub mod backend;
mod camera;
mod config;
pub mod document;
mod effect;
mod error;
pub mod fs;
mod gpu;
pub mod hot_reload;
mod material;
mod mesh;
pub mod render_graph;
mod renderer;
mod shader;
mod technique;

pub use app::{Frame, run};
pub use backend::{Backend, Extent, FixedFunctionState, PassEncoder, SurfaceInfo};
pub use camera::{Camera, CameraUniform};
pub use config::{AssetConfig, EngineConfig, LogConfig, RendererConfig, WindowConfig};
pub use document::{ParseError, Table};
pub use effect::{Effect, EffectDesc, EffectId, EffectManager, RenderStage};
pub use error::{EntryKind, Error, ErrorKind, Result};
pub use fs::{DiskSource, FileSource};
pub use gpu::GpuContext;
pub use hot_reload::{ChangeFeed, DirEvent, DirEventKind, DirMonitor, NullFeed};
pub use material::{Material, MaterialDesc, MaterialId, MaterialManager, MaterialParams};
pub use mesh::{Mesh, MeshData, Transform, Vertex3d};
pub use render_graph::{
    DrawCall, DrawQueue, FrameResources, GBufferNode, MeshId, MeshStore, PassContext, PassId,
    RenderGraph, RenderNode, TextureId,
};
pub use renderer::Renderer;
pub use shader::{ReloadReport, Shader, ShaderDependents, ShaderId, ShaderManager, ShaderStage};
pub use technique::{Technique, TechniqueDesc, TechniqueId, TechniqueManager};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec3, Vec4};
