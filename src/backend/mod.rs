//! The device seam between the renderer core and the GPU.
//!
//! The shader, technique and material managers and the render graph never
//! talk to wgpu directly. They create and record through a [`Backend`], whose
//! associated types are the opaque GPU objects they hold on to. [`GpuContext`]
//! is the real implementation; tests substitute a recording double.
//!
//! Recording happens through [`PassEncoder`], an object-safe handle to one
//! open render pass:
//!
//! ```ignore
//! backend.record_pass(&mut frame, &framebuffer, "gbuffer", &mut |encoder| {
//!     encoder.upload_camera(&camera);
//!     encoder.bind_technique(technique.pipeline());
//!     encoder.bind_frame_resources(technique.pipeline());
//!     encoder.bind_material(binding);
//!     encoder.push_model(&model);
//!     encoder.draw_mesh(mesh);
//!     Ok(())
//! })?;
//! ```
//!
//! [`GpuContext`]: crate::gpu::GpuContext

mod wgpu_impl;

use glam::Mat4;

use crate::camera::CameraUniform;
use crate::error::Result;
use crate::material::MaterialParams;
use crate::mesh::MeshData;
use crate::shader::ShaderStage;

pub use wgpu_impl::{
    GraphTexture, MaterialBindGroup, TechniquePipeline, WgpuFrame, WgpuFramebuffer,
};

/// Format of every depth attachment the graph allocates.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Size of the model-matrix push-constant block.
pub const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<[[f32; 4]; 4]>() as u32;

/// Width and height of a render target in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// What the backend's swapchain currently looks like.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceInfo {
    /// Number of distinct image indices `begin_frame` can hand out.
    pub image_count: u32,
    pub extent: Extent,
    pub color_format: wgpu::TextureFormat,
}

/// Fixed-function switches a technique may override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedFunctionState {
    /// Cull back faces.
    pub cull: bool,
    /// Depth test (less) and depth write.
    pub depth: bool,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            cull: true,
            depth: true,
        }
    }
}

/// The attachment formats a pipeline must be compatible with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassFormat {
    pub color: wgpu::TextureFormat,
    pub depth: Option<wgpu::TextureFormat>,
}

impl PassFormat {
    /// Layout of the built-in gbuffer pass: one swapchain color target plus depth.
    pub fn gbuffer(color: wgpu::TextureFormat) -> Self {
        Self {
            color,
            depth: Some(DEPTH_FORMAT),
        }
    }
}

pub struct PipelineDesc<'a, B: Backend> {
    pub label: &'a str,
    pub vertex: &'a B::ShaderModule,
    pub fragment: &'a B::ShaderModule,
    pub state: FixedFunctionState,
    pub pass: PassFormat,
}

/// Where a color attachment's image comes from.
pub enum AttachmentTarget<'a, B: Backend> {
    /// The swapchain image acquired for the frame being recorded.
    Swapchain,
    Texture(&'a B::Texture),
}

pub struct ColorAttachment<'a, B: Backend> {
    pub target: AttachmentTarget<'a, B>,
    /// Clear on load instead of preserving earlier contents.
    pub clear: bool,
}

pub struct DepthAttachment<'a, B: Backend> {
    pub texture: &'a B::Texture,
    pub clear: bool,
}

/// Everything needed to build the framebuffer of one pass for one swapchain image.
pub struct FramebufferDesc<'a, B: Backend> {
    pub label: &'a str,
    pub image_index: u32,
    pub colors: Vec<ColorAttachment<'a, B>>,
    pub depth: Option<DepthAttachment<'a, B>>,
    pub extent: Extent,
}

/// A GPU device the renderer core can build resources on and record into.
pub trait Backend: Sized {
    type ShaderModule;
    type Pipeline;
    type MaterialBinding;
    type Mesh;
    type Texture;
    type Framebuffer;
    type Frame;

    fn surface(&self) -> SurfaceInfo;

    /// Number of frames the host may record ahead of the GPU.
    fn frames_in_flight(&self) -> usize;

    /// Compiles shader source. Diagnostics surface as [`Error::InvalidShader`].
    ///
    /// [`Error::InvalidShader`]: crate::Error::InvalidShader
    fn create_shader_module(
        &self,
        name: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self::ShaderModule>;

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline>;

    fn create_material_binding(
        &self,
        label: &str,
        params: &MaterialParams,
    ) -> Result<Self::MaterialBinding>;

    fn create_mesh(&self, data: &MeshData) -> Result<Self::Mesh>;

    /// Allocates a render-target texture. Depth formats become depth attachments.
    fn create_texture(
        &self,
        name: &str,
        format: wgpu::TextureFormat,
        extent: Extent,
    ) -> Result<Self::Texture>;

    fn create_framebuffer(&self, desc: &FramebufferDesc<'_, Self>) -> Result<Self::Framebuffer>;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<()>;

    /// Waits for `frame_slot` to be free and acquires the next swapchain image.
    ///
    /// Returns `Ok(None)` when the surface is out of date; the caller should
    /// rebuild size-dependent resources and skip the frame.
    fn begin_frame(&mut self, frame_slot: usize) -> Result<Option<(Self::Frame, u32)>>;

    /// Opens a render pass on `framebuffer` and hands it to `record`.
    fn record_pass(
        &self,
        frame: &mut Self::Frame,
        framebuffer: &Self::Framebuffer,
        label: &str,
        record: &mut dyn FnMut(&mut dyn PassEncoder<Self>) -> Result<()>,
    ) -> Result<()>;

    /// Submits the frame's commands and presents.
    fn end_frame(&mut self, frame: Self::Frame) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);
}

/// Commands available inside an open render pass.
pub trait PassEncoder<B: Backend> {
    /// Writes the camera uniform for the frame slot being recorded.
    fn upload_camera(&mut self, camera: &CameraUniform);

    fn bind_technique(&mut self, pipeline: &B::Pipeline);

    /// Binds the technique's per-frame descriptor set (camera uniform).
    fn bind_frame_resources(&mut self, pipeline: &B::Pipeline);

    fn bind_material(&mut self, binding: &B::MaterialBinding);

    fn push_model(&mut self, model: &Mat4);

    /// Binds the mesh's buffers and issues an indexed draw.
    fn draw_mesh(&mut self, mesh: &B::Mesh);
}
