//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use kiln::backend::{AttachmentTarget, FramebufferDesc, PipelineDesc};
use kiln::fs::load_document;
use kiln::hot_reload::{ChangeFeed, DirEvent, NullFeed};
use kiln::{
    Backend, CameraUniform, EffectManager, Error, Extent, FileSource, FrameResources, Mat4,
    MaterialId, MaterialManager, MaterialParams, MeshData, MeshId, MeshStore, PassEncoder,
    Result, ShaderManager, ShaderStage, SurfaceInfo, TechniqueManager,
};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

/// Sources containing this marker fail to compile.
pub const BROKEN: &str = "@@ syntax error @@";

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    BeginFrame { slot: usize, image: u32 },
    EndFrame { slot: usize },
    BeginPass(String),
    EndPass(String),
    UploadCamera,
    BindTechnique(String),
    BindFrameResources(String),
    BindMaterial(String),
    PushModel,
    Draw(usize),
    WaitIdle,
}

#[derive(Clone, Debug)]
pub struct MockModule {
    pub name: String,
    pub stage: ShaderStage,
    /// Unique per compile.
    pub serial: usize,
}

#[derive(Clone, Debug)]
pub struct MockPipeline {
    pub label: String,
    /// Unique per pipeline build.
    pub serial: usize,
    pub vertex: usize,
    pub fragment: usize,
    pub cull: bool,
    pub depth: bool,
}

#[derive(Clone, Debug)]
pub struct MockBinding {
    pub label: String,
    pub color: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct MockMesh {
    pub serial: usize,
    pub index_count: u32,
}

#[derive(Clone, Debug)]
pub struct MockTexture {
    pub name: String,
    pub extent: Extent,
}

/// Attachment summary: target name and whether it clears.
#[derive(Clone, Debug)]
pub struct MockFramebuffer {
    pub label: String,
    pub image_index: u32,
    pub colors: Vec<(String, bool)>,
    pub depth: Option<(String, bool)>,
}

pub struct MockFrame {
    pub slot: usize,
    pub image: u32,
}

/// A [`Backend`] that records what it is asked to do instead of touching a GPU.
pub struct RecordingBackend {
    pub frames_in_flight: usize,
    pub extent: Extent,
    pub compiles: Cell<usize>,
    pub pipelines: Cell<usize>,
    pub textures: Cell<usize>,
    /// Every framebuffer built, in creation order.
    pub framebuffers: RefCell<Vec<MockFramebuffer>>,
    serial: Cell<usize>,
    next_image: Cell<u32>,
    /// Makes the next `begin_frame` report an out-of-date surface.
    pub outdated: Cell<bool>,
    /// Pipelines with this label fail to build.
    pub fail_pipeline: RefCell<Option<String>>,
    pub events: RefCell<Vec<Event>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            frames_in_flight: 2,
            extent: Extent::new(640, 480),
            compiles: Cell::new(0),
            pipelines: Cell::new(0),
            textures: Cell::new(0),
            framebuffers: RefCell::new(Vec::new()),
            serial: Cell::new(0),
            next_image: Cell::new(0),
            outdated: Cell::new(false),
            fail_pipeline: RefCell::new(None),
            events: RefCell::new(Vec::new()),
        }
    }

    fn next_serial(&self) -> usize {
        let serial = self.serial.get() + 1;
        self.serial.set(serial);
        serial
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}

impl Backend for RecordingBackend {
    type ShaderModule = MockModule;
    type Pipeline = MockPipeline;
    type MaterialBinding = MockBinding;
    type Mesh = MockMesh;
    type Texture = MockTexture;
    type Framebuffer = MockFramebuffer;
    type Frame = MockFrame;

    fn surface(&self) -> SurfaceInfo {
        SurfaceInfo {
            image_count: self.frames_in_flight as u32 + 1,
            extent: self.extent,
            color_format: COLOR_FORMAT,
        }
    }

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn create_shader_module(
        &self,
        name: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<MockModule> {
        if source.contains(BROKEN) {
            return Err(Error::InvalidShader {
                name: format!("{name} ({stage})"),
                diagnostics: "error: expected declaration".to_owned(),
            });
        }
        self.compiles.set(self.compiles.get() + 1);
        Ok(MockModule {
            name: name.to_owned(),
            stage,
            serial: self.next_serial(),
        })
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<MockPipeline> {
        if self.fail_pipeline.borrow().as_deref() == Some(desc.label) {
            return Err(Error::Library(format!("pipeline '{}' failed validation", desc.label)));
        }
        self.pipelines.set(self.pipelines.get() + 1);
        Ok(MockPipeline {
            label: desc.label.to_owned(),
            serial: self.next_serial(),
            vertex: desc.vertex.serial,
            fragment: desc.fragment.serial,
            cull: desc.state.cull,
            depth: desc.state.depth,
        })
    }

    fn create_material_binding(&self, label: &str, params: &MaterialParams) -> Result<MockBinding> {
        Ok(MockBinding {
            label: label.to_owned(),
            color: params.color,
        })
    }

    fn create_mesh(&self, data: &MeshData) -> Result<MockMesh> {
        if data.indices.is_empty() {
            return Err(Error::InvalidUsage("mesh has no indices".to_owned()));
        }
        Ok(MockMesh {
            serial: self.next_serial(),
            index_count: data.index_count(),
        })
    }

    fn create_texture(
        &self,
        name: &str,
        _format: wgpu::TextureFormat,
        extent: Extent,
    ) -> Result<MockTexture> {
        self.textures.set(self.textures.get() + 1);
        Ok(MockTexture {
            name: name.to_owned(),
            extent,
        })
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc<'_, Self>) -> Result<MockFramebuffer> {
        let colors = desc
            .colors
            .iter()
            .map(|c| {
                let name = match &c.target {
                    AttachmentTarget::Swapchain => "swapchain".to_owned(),
                    AttachmentTarget::Texture(t) => t.name.clone(),
                };
                (name, c.clear)
            })
            .collect();
        let framebuffer = MockFramebuffer {
            label: desc.label.to_owned(),
            image_index: desc.image_index,
            colors,
            depth: desc.depth.as_ref().map(|d| (d.texture.name.clone(), d.clear)),
        };
        self.framebuffers.borrow_mut().push(framebuffer.clone());
        Ok(framebuffer)
    }

    fn wait_idle(&self) -> Result<()> {
        self.push(Event::WaitIdle);
        Ok(())
    }

    fn begin_frame(&mut self, frame_slot: usize) -> Result<Option<(MockFrame, u32)>> {
        if self.outdated.replace(false) {
            return Ok(None);
        }
        let image = self.next_image.get();
        self.next_image.set((image + 1) % self.surface().image_count);
        self.push(Event::BeginFrame {
            slot: frame_slot,
            image,
        });
        Ok(Some((
            MockFrame {
                slot: frame_slot,
                image,
            },
            image,
        )))
    }

    fn record_pass(
        &self,
        _frame: &mut MockFrame,
        framebuffer: &MockFramebuffer,
        label: &str,
        record: &mut dyn FnMut(&mut dyn PassEncoder<Self>) -> Result<()>,
    ) -> Result<()> {
        assert_eq!(framebuffer.label, label);
        self.push(Event::BeginPass(label.to_owned()));
        let mut encoder = RecordingEncoder { backend: self };
        let result = record(&mut encoder);
        self.push(Event::EndPass(label.to_owned()));
        result
    }

    fn end_frame(&mut self, frame: MockFrame) -> Result<()> {
        self.push(Event::EndFrame { slot: frame.slot });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.extent = Extent::new(width, height);
    }
}

struct RecordingEncoder<'a> {
    backend: &'a RecordingBackend,
}

impl PassEncoder<RecordingBackend> for RecordingEncoder<'_> {
    fn upload_camera(&mut self, _camera: &CameraUniform) {
        self.backend.push(Event::UploadCamera);
    }

    fn bind_technique(&mut self, pipeline: &MockPipeline) {
        self.backend.push(Event::BindTechnique(pipeline.label.clone()));
    }

    fn bind_frame_resources(&mut self, pipeline: &MockPipeline) {
        self.backend
            .push(Event::BindFrameResources(pipeline.label.clone()));
    }

    fn bind_material(&mut self, binding: &MockBinding) {
        self.backend.push(Event::BindMaterial(binding.label.clone()));
    }

    fn push_model(&mut self, _model: &Mat4) {
        self.backend.push(Event::PushModel);
    }

    fn draw_mesh(&mut self, mesh: &MockMesh) {
        self.backend.push(Event::Draw(mesh.serial));
    }
}

/// Files served from memory. Clones share contents, so a test can keep a
/// handle and edit files after giving one to a manager.
#[derive(Clone, Default)]
pub struct MemorySource {
    files: Rc<RefCell<HashMap<String, String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: &str, contents: &str) -> Self {
        self.set(path, contents);
        self
    }

    pub fn set(&self, path: &str, contents: &str) {
        self.files
            .borrow_mut()
            .insert(path.to_owned(), contents.to_owned());
    }

    pub fn shared(&self) -> Arc<dyn FileSource> {
        Arc::new(self.clone())
    }
}

impl FileSource for MemorySource {
    fn load(&self, path: &str) -> Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::MissingFile {
                path: path.into(),
                source: None,
            })
    }
}

/// A change feed whose batches are pushed by the test.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    batches: Rc<RefCell<VecDeque<Vec<DirEvent>>>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch returned by the next `poll`.
    pub fn push(&self, events: Vec<DirEvent>) {
        self.batches.borrow_mut().push_back(events);
    }

    pub fn boxed(&self) -> Box<dyn ChangeFeed> {
        Box::new(self.clone())
    }
}

impl ChangeFeed for ScriptedFeed {
    fn poll(&mut self) -> Vec<DirEvent> {
        self.batches.borrow_mut().pop_front().unwrap_or_default()
    }
}

/// Empty managers, for graphs that only need somewhere to draw from.
pub struct NoAssets {
    pub techniques: TechniqueManager<RecordingBackend>,
    pub effects: EffectManager,
    pub materials: MaterialManager<RecordingBackend>,
    pub meshes: MeshStore<RecordingBackend>,
}

impl NoAssets {
    pub fn new() -> Self {
        Self {
            techniques: TechniqueManager::new(),
            effects: EffectManager::new(),
            materials: MaterialManager::new(),
            meshes: MeshStore::new(),
        }
    }

    pub fn resources(&self) -> FrameResources<'_, RecordingBackend> {
        FrameResources {
            techniques: &self.techniques,
            effects: &self.effects,
            materials: &self.materials,
            meshes: &self.meshes,
            camera: None,
        }
    }
}

/// Every manager opened from a [`MemorySource`], the way the renderer boots them.
pub struct Loaded {
    pub meshes: MeshStore<RecordingBackend>,
    pub materials: MaterialManager<RecordingBackend>,
    pub effects: EffectManager,
    pub techniques: TechniqueManager<RecordingBackend>,
    pub shaders: ShaderManager<RecordingBackend>,
}

impl Loaded {
    pub fn open(
        backend: &RecordingBackend,
        files: &MemorySource,
        feed: Box<dyn ChangeFeed>,
    ) -> Result<Self> {
        let mut shaders = ShaderManager::new(files.shared(), feed, "shaders");
        let mut techniques = TechniqueManager::new();
        techniques.open(backend, &mut shaders, &load_document(files, "techs.ron")?)?;
        let mut effects = EffectManager::new();
        effects.open(&techniques, &load_document(files, "effects.ron")?)?;
        let mut materials = MaterialManager::new();
        materials.open(backend, &effects, &load_document(files, "material.ron")?)?;
        Ok(Self {
            meshes: MeshStore::new(),
            materials,
            effects,
            techniques,
            shaders,
        })
    }

    pub fn resources(&self, camera: Option<CameraUniform>) -> FrameResources<'_, RecordingBackend> {
        FrameResources {
            techniques: &self.techniques,
            effects: &self.effects,
            materials: &self.materials,
            meshes: &self.meshes,
            camera,
        }
    }
}

/// A real mesh id and material id for queuing draws.
pub fn draw_handles(backend: &RecordingBackend) -> (MeshId, MaterialId) {
    let mut loaded = Loaded::open(backend, &sample_assets(), Box::new(NullFeed)).unwrap();
    let mesh = loaded
        .meshes
        .insert(backend.create_mesh(&MeshData::cube()).unwrap());
    (mesh, loaded.materials.id("red").unwrap())
}

pub fn doc<T: serde::de::DeserializeOwned>(src: &str) -> T {
    kiln::document::parse(src).expect("test document parses")
}

/// The three documents plus shader sources for a small, valid asset tree.
pub fn sample_assets() -> MemorySource {
    MemorySource::new()
        .with("shaders/a.vert", "vertex a")
        .with("shaders/a.frag", "fragment a")
        .with("shaders/b.frag", "fragment b")
        .with(
            "techs.ron",
            r#"{
                "tri": (vert: "a.vert", frag: "a.frag"),
                "other": (vert: "a.vert", frag: "b.frag", cull: false),
            }"#,
        )
        .with("effects.ron", r#"{ "solid": (gbuffer: "tri"), "alt": (gbuffer: "other") }"#)
        .with(
            "material.ron",
            r#"{
                "red": (effect: "solid", color: [1.0, 0.0, 0.0]),
                "blue": (effect: "alt", color: [0.0, 0.0, 1.0, 1.0]),
            }"#,
        )
}
