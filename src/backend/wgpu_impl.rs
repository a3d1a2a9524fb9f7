//! [`Backend`] implementation on wgpu.
//!
//! Bind group layout shared by every technique pipeline:
//!
//! | Group | Binding | Contents          | Stage    | Owner                    |
//! |-------|---------|-------------------|----------|--------------------------|
//! | 0     | 0       | camera uniform    | vertex   | technique, per frame slot|
//! | 1     | 0       | material params   | fragment | material                 |
//! | push  | 0..64   | model matrix      | vertex   | draw call                |
//!
//! Shaders are WGSL with a single entry point named `main`.

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::backend::{
    AttachmentTarget, Backend, Extent, FramebufferDesc, PUSH_CONSTANT_SIZE, PassEncoder,
    PipelineDesc, SurfaceInfo,
};
use crate::camera::CameraUniform;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::material::MaterialParams;
use crate::mesh::{Mesh, MeshData, Vertex3d};
use crate::shader::ShaderStage;

const ENTRY_POINT: &str = "main";

/// A technique's pipeline and the objects it was built from.
///
/// Fields drop in declaration order: descriptor-set layout, pipeline,
/// pipeline layout, then the per-frame bind groups.
pub struct TechniquePipeline {
    _bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    _layout: wgpu::PipelineLayout,
    frame_bind_groups: Vec<wgpu::BindGroup>,
}

/// A material's uniform buffer and the bind group exposing it.
pub struct MaterialBindGroup {
    _buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// A graph-owned render target. Framebuffers take their own views of it.
pub struct GraphTexture {
    texture: wgpu::Texture,
}

/// Attachments of one pass. A `None` color view is the swapchain image.
pub struct WgpuFramebuffer {
    colors: Vec<(Option<wgpu::TextureView>, bool)>,
    depth: Option<(wgpu::TextureView, bool)>,
}

/// A frame being recorded: the acquired surface texture and its encoder.
pub struct WgpuFrame {
    encoder: wgpu::CommandEncoder,
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    slot: usize,
}

impl GpuContext {
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match oom.or(validation) {
            Some(err) => Err(Error::from(err)),
            None => Ok(value),
        }
    }
}

impl Backend for GpuContext {
    type ShaderModule = wgpu::ShaderModule;
    type Pipeline = TechniquePipeline;
    type MaterialBinding = MaterialBindGroup;
    type Mesh = Mesh;
    type Texture = GraphTexture;
    type Framebuffer = WgpuFramebuffer;
    type Frame = WgpuFrame;

    fn surface(&self) -> SurfaceInfo {
        SurfaceInfo {
            image_count: self.frames_in_flight as u32 + 1,
            extent: Extent::new(self.config.width, self.config.height),
            color_format: self.config.format,
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
    ) -> Result<wgpu::ShaderModule> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            let diagnostics = match err {
                wgpu::Error::Validation { description, .. } => description,
                other => other.to_string(),
            };
            return Err(Error::InvalidShader {
                name: format!("{name} ({stage})"),
                diagnostics,
            });
        }
        Ok(module)
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<TechniquePipeline> {
        let device = &self.device;
        self.scoped(|| {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} Frame Layout", desc.label)),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} Pipeline Layout", desc.label)),
                bind_group_layouts: &[&bind_group_layout, &self.material_layout],
                push_constant_ranges: &[wgpu::PushConstantRange {
                    stages: wgpu::ShaderStages::VERTEX,
                    range: 0..PUSH_CONSTANT_SIZE,
                }],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: desc.vertex,
                    entry_point: Some(ENTRY_POINT),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: desc.fragment,
                    entry_point: Some(ENTRY_POINT),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: desc.pass.color,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: desc.state.cull.then_some(wgpu::Face::Back),
                    front_face: wgpu::FrontFace::Ccw,
                    ..Default::default()
                },
                depth_stencil: desc.pass.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: desc.state.depth,
                    depth_compare: if desc.state.depth {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            let frame_bind_groups = self
                .camera_buffers
                .iter()
                .enumerate()
                .map(|(slot, buffer)| {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("{} Frame {slot}", desc.label)),
                        layout: &bind_group_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        }],
                    })
                })
                .collect();

            TechniquePipeline {
                _bind_group_layout: bind_group_layout,
                pipeline,
                _layout: layout,
                frame_bind_groups,
            }
        })
    }

    fn create_material_binding(
        &self,
        label: &str,
        params: &MaterialParams,
    ) -> Result<MaterialBindGroup> {
        self.scoped(|| {
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::bytes_of(params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.material_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            MaterialBindGroup {
                _buffer: buffer,
                bind_group,
            }
        })
    }

    fn create_mesh(&self, data: &MeshData) -> Result<Mesh> {
        if data.indices.is_empty() {
            return Err(Error::InvalidUsage("mesh has no indices".into()));
        }
        self.scoped(|| Mesh::upload(&self.device, data))
    }

    fn create_texture(
        &self,
        name: &str,
        format: wgpu::TextureFormat,
        extent: Extent,
    ) -> Result<GraphTexture> {
        self.scoped(|| {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(name),
                size: wgpu::Extent3d {
                    width: extent.width.max(1),
                    height: extent.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            GraphTexture { texture }
        })
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc<'_, Self>) -> Result<WgpuFramebuffer> {
        // Views are cheap handles; each framebuffer holds its own.
        let colors = desc
            .colors
            .iter()
            .map(|attachment| {
                let view = match attachment.target {
                    AttachmentTarget::Swapchain => None,
                    AttachmentTarget::Texture(graph) => Some(
                        graph
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default()),
                    ),
                };
                (view, attachment.clear)
            })
            .collect();
        let depth = desc.depth.as_ref().map(|attachment| {
            (
                attachment
                    .texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
                attachment.clear,
            )
        });
        Ok(WgpuFramebuffer { colors, depth })
    }

    fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|err| Error::Library(format!("device wait failed: {err}")))
    }

    fn begin_frame(&mut self, frame_slot: usize) -> Result<Option<(WgpuFrame, u32)>> {
        if let Some(index) = self.submissions.get_mut(frame_slot).and_then(Option::take) {
            self.device
                .poll(wgpu::PollType::Wait {
                    submission_index: Some(index),
                    timeout: None,
                })
                .map_err(|err| Error::Library(format!("frame fence wait failed: {err}")))?;
        }

        let surface = match self.surface.get_current_texture() {
            Ok(surface) => surface,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                self.reconfigure();
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out acquiring swapchain image; skipping frame");
                return Ok(None);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(Error::OutOfMemory("acquiring swapchain image".into()));
            }
            Err(err) => return Err(Error::Library(err.to_string())),
        };
        let view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let image_count = self.frames_in_flight as u32 + 1;
        let image_index = self.next_image % image_count;
        self.next_image = (image_index + 1) % image_count;

        Ok(Some((
            WgpuFrame {
                encoder,
                surface,
                view,
                slot: frame_slot,
            },
            image_index,
        )))
    }

    fn record_pass(
        &self,
        frame: &mut WgpuFrame,
        framebuffer: &WgpuFramebuffer,
        label: &str,
        record: &mut dyn FnMut(&mut dyn PassEncoder<Self>) -> Result<()>,
    ) -> Result<()> {
        let color_attachments: Vec<_> = framebuffer
            .colors
            .iter()
            .map(|(view, clear)| {
                Some(wgpu::RenderPassColorAttachment {
                    view: view.as_ref().unwrap_or(&frame.view),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if *clear {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: framebuffer.depth.as_ref().map(|(view, clear)| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if *clear {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let camera = self.camera_buffers.get(frame.slot).ok_or_else(|| {
            Error::InvalidUsage(format!("frame slot {} out of range", frame.slot))
        })?;
        let mut encoder = WgpuPassEncoder {
            pass,
            queue: &self.queue,
            camera,
            slot: frame.slot,
        };
        // Dropping the encoder ends the pass.
        record(&mut encoder)
    }

    fn end_frame(&mut self, frame: WgpuFrame) -> Result<()> {
        let WgpuFrame {
            encoder,
            surface,
            slot,
            ..
        } = frame;
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(entry) = self.submissions.get_mut(slot) {
            *entry = Some(index);
        }
        surface.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
    }
}

struct WgpuPassEncoder<'a> {
    pass: wgpu::RenderPass<'a>,
    queue: &'a wgpu::Queue,
    camera: &'a wgpu::Buffer,
    slot: usize,
}

impl PassEncoder<GpuContext> for WgpuPassEncoder<'_> {
    fn upload_camera(&mut self, camera: &CameraUniform) {
        self.queue
            .write_buffer(self.camera, 0, bytemuck::bytes_of(camera));
    }

    fn bind_technique(&mut self, pipeline: &TechniquePipeline) {
        self.pass.set_pipeline(&pipeline.pipeline);
    }

    fn bind_frame_resources(&mut self, pipeline: &TechniquePipeline) {
        if let Some(group) = pipeline.frame_bind_groups.get(self.slot) {
            self.pass.set_bind_group(0, group, &[]);
        }
    }

    fn bind_material(&mut self, binding: &MaterialBindGroup) {
        self.pass.set_bind_group(1, &binding.bind_group, &[]);
    }

    fn push_model(&mut self, model: &Mat4) {
        self.pass.set_push_constants(
            wgpu::ShaderStages::VERTEX,
            0,
            bytemuck::bytes_of(&model.to_cols_array_2d()),
        );
    }

    fn draw_mesh(&mut self, mesh: &Mesh) {
        self.pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.pass
            .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}
