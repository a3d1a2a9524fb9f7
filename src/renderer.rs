//! The per-frame orchestrator tying the managers and the render graph together.

use std::sync::Arc;

use crate::backend::{Backend, DEPTH_FORMAT};
use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::effect::EffectManager;
use crate::error::Result;
use crate::fs::{self, FileSource};
use crate::hot_reload::ChangeFeed;
use crate::material::{MaterialId, MaterialManager};
use crate::mesh::{MeshData, Transform};
use crate::render_graph::{DrawQueue, FrameResources, GBufferNode, MeshId, MeshStore, RenderGraph};
use crate::shader::{ReloadReport, ShaderManager};
use crate::technique::TechniqueManager;

/// Owns the backend, the asset managers and the render graph.
///
/// ```ignore
/// let mut renderer = Renderer::boot(gpu, &config, files, feed)?;
/// let cube = renderer.create_mesh(&MeshData::cube())?;
/// let red = renderer.material("red").expect("material.ron defines red");
/// renderer.set_camera(Some(Camera::new().at(0.0, 0.0, 5.0)));
///
/// // Every frame:
/// renderer.draw_mesh(cube, Transform::new(), red);
/// renderer.draw_frame()?;
/// ```
pub struct Renderer<B: Backend> {
    // Fields drop in declaration order: everything holding GPU objects goes
    // before the managers it was built from, and the backend goes last.
    graph: RenderGraph<B>,
    draws: DrawQueue,
    meshes: MeshStore<B>,
    materials: MaterialManager<B>,
    effects: EffectManager,
    techniques: TechniqueManager<B>,
    shaders: ShaderManager<B>,
    camera: Option<Camera>,
    current_frame: usize,
    backend: B,
}

impl<B: Backend> Renderer<B> {
    /// Loads the technique, effect and material documents named by `config`
    /// and builds the default graph: one gbuffer pass writing the swapchain
    /// and a depth texture.
    ///
    /// Any failure here is a startup failure and is returned unchanged.
    pub fn boot(
        backend: B,
        config: &EngineConfig,
        files: Arc<dyn FileSource>,
        feed: Box<dyn ChangeFeed>,
    ) -> Result<Self> {
        let assets = &config.assets;
        let mut shaders = ShaderManager::new(files.clone(), feed, assets.shaders.as_str());

        let mut techniques = TechniqueManager::new();
        let table = fs::load_document(&*files, &assets.techniques)?;
        let count = techniques.open(&backend, &mut shaders, &table)?;
        log::info!("loaded {count} technique(s), {} shader(s)", shaders.len());

        let mut effects = EffectManager::new();
        let count = effects.open(&techniques, &fs::load_document(&*files, &assets.effects)?)?;
        log::info!("loaded {count} effect(s)");

        let mut materials = MaterialManager::new();
        let table = fs::load_document(&*files, &assets.materials)?;
        let count = materials.open(&backend, &effects, &table)?;
        log::info!("loaded {count} material(s)");

        let mut graph = RenderGraph::new(backend.surface().color_format);
        let depth = graph.create_texture("depth", DEPTH_FORMAT);
        let gbuffer = graph.create_pass("gbuffer", GBufferNode::new());
        graph.write_texture(gbuffer, graph.swapchain())?;
        graph.write_texture(gbuffer, depth)?;
        graph.bake()?;

        Ok(Self {
            graph,
            draws: DrawQueue::new(),
            meshes: MeshStore::new(),
            materials,
            effects,
            techniques,
            shaders,
            camera: None,
            current_frame: 0,
            backend,
        })
    }

    /// Uploads a mesh. It stays alive as long as the renderer.
    pub fn create_mesh(&mut self, data: &MeshData) -> Result<MeshId> {
        let mesh = self.backend.create_mesh(data)?;
        Ok(self.meshes.insert(mesh))
    }

    /// Queues a mesh for the next [`draw_frame`](Self::draw_frame).
    pub fn draw_mesh(&mut self, mesh: MeshId, transform: Transform, material: MaterialId) {
        self.draws.push(mesh, transform, material);
    }

    pub fn material(&self, name: &str) -> Option<MaterialId> {
        self.materials.id(name)
    }

    /// Sets the active camera. Meshes are only drawn while one is set.
    pub fn set_camera(&mut self, camera: Option<Camera>) {
        self.camera = camera;
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Checks for shader changes, then records, submits and presents one frame.
    ///
    /// An out-of-date surface rebuilds the graph's size-dependent resources
    /// and skips the frame. Queued draws are consumed either way.
    pub fn draw_frame(&mut self) -> Result<ReloadReport> {
        let report = self.shaders.reload_check(&self.backend, &mut self.techniques);

        let Some((mut frame, image_index)) = self.backend.begin_frame(self.current_frame)? else {
            self.draws.clear();
            self.graph.rebuild(&self.backend)?;
            return Ok(report);
        };

        let aspect = self.backend.surface().extent.aspect();
        let resources = FrameResources {
            techniques: &self.techniques,
            effects: &self.effects,
            materials: &self.materials,
            meshes: &self.meshes,
            camera: self.camera.as_ref().map(|c| c.uniform(aspect)),
        };
        self.graph.record(
            &self.backend,
            &mut frame,
            image_index,
            self.current_frame,
            &resources,
            &mut self.draws,
        )?;
        self.backend.end_frame(frame)?;

        self.current_frame = (self.current_frame + 1) % self.backend.frames_in_flight().max(1);
        Ok(report)
    }

    /// Resizes the surface and recreates the graph's size-dependent resources.
    ///
    /// A zero-sized window (minimized) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.backend.resize(width, height);
        self.graph.rebuild(&self.backend)
    }

    /// In-flight slot the next frame will use.
    pub fn frame_slot(&self) -> usize {
        self.current_frame
    }

    pub fn queued_draws(&self) -> usize {
        self.draws.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn graph(&self) -> &RenderGraph<B> {
        &self.graph
    }

    /// The graph, for adding passes. Structural changes re-bake on the next frame.
    pub fn graph_mut(&mut self) -> &mut RenderGraph<B> {
        &mut self.graph
    }

    pub fn shaders(&self) -> &ShaderManager<B> {
        &self.shaders
    }

    pub fn techniques(&self) -> &TechniqueManager<B> {
        &self.techniques
    }

    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    pub fn materials(&self) -> &MaterialManager<B> {
        &self.materials
    }

    pub fn meshes(&self) -> &MeshStore<B> {
        &self.meshes
    }
}
