//! Core GPU context and device management.
//!
//! This module provides [`GpuContext`], the struct that holds every wgpu object
//! the renderer needs: instance-derived surface, device, queue and surface
//! configuration, plus the per-frame resources shared by all techniques (one
//! camera uniform buffer per in-flight frame and the material bind group
//! layout). `GpuContext` implements [`Backend`](crate::backend::Backend), so it
//! is what the shader, technique and material managers build their GPU objects
//! on.
//!
//! # Initialization
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln::{GpuContext, RendererConfig};
//!
//! # fn demo(window: Arc<winit::window::Window>) -> kiln::Result<()> {
//! let gpu = GpuContext::new(window, &RendererConfig::default())?;
//! println!("{}x{}", gpu.width(), gpu.height());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use winit::window::Window;

use crate::backend::PUSH_CONSTANT_SIZE;
use crate::camera::CameraUniform;
use crate::config::RendererConfig;
use crate::error::{Error, Result};

/// Core GPU context holding wgpu resources.
///
/// The surface, device, queue and configuration are public so callers can
/// reach the raw wgpu API when they need to. The per-frame resources are
/// private; they are only touched while recording through the backend.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
    pub(crate) frames_in_flight: usize,
    /// Camera uniform buffer per in-flight frame slot.
    pub(crate) camera_buffers: Vec<wgpu::Buffer>,
    /// Layout of the per-material bind group (group 1).
    pub(crate) material_layout: wgpu::BindGroupLayout,
    /// Last submission recorded from each frame slot.
    pub(crate) submissions: Vec<Option<wgpu::SubmissionIndex>>,
    pub(crate) next_image: u32,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// This performs all wgpu initialization:
    /// 1. Creates a wgpu instance with primary backends (Vulkan, Metal, DX12)
    /// 2. Creates a surface for the window
    /// 3. Requests an adapter that can present to it and supports push constants
    /// 4. Creates the logical device and command queue
    /// 5. Configures the surface with an sRGB format, allowing at most
    ///    `frames_in_flight` frames to be queued
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuitableHardware`] if no adapter is found or the adapter
    /// lacks push-constant support, and [`Error::Library`] if surface or device
    /// creation fails.
    pub fn new(window: Arc<Window>, settings: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|err| Error::Library(format!("failed to create surface: {err}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| Error::NoSuitableHardware(err.to_string()))?;

        let info = adapter.get_info();
        if !adapter.features().contains(wgpu::Features::PUSH_CONSTANTS) {
            return Err(Error::NoSuitableHardware(format!(
                "adapter '{}' does not support push constants",
                info.name
            )));
        }
        if adapter.limits().max_push_constant_size < PUSH_CONSTANT_SIZE {
            return Err(Error::NoSuitableHardware(format!(
                "adapter '{}' allows only {} bytes of push constants",
                info.name,
                adapter.limits().max_push_constant_size
            )));
        }
        log::info!("using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Kiln Device"),
            required_features: wgpu::Features::PUSH_CONSTANTS,
            required_limits: wgpu::Limits {
                max_push_constant_size: PUSH_CONSTANT_SIZE,
                ..Default::default()
            },
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|err| Error::Library(format!("failed to create device: {err}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| {
                Error::NoSuitableHardware("surface reports no supported formats".into())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let frames_in_flight = settings.frames_in_flight.max(1);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::Fifo
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: frames_in_flight as u32,
        };
        surface.configure(&device, &config);

        let camera_buffers = (0..frames_in_flight)
            .map(|slot| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Camera Uniform {slot}")),
                    size: std::mem::size_of::<CameraUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            frames_in_flight,
            camera_buffers,
            material_layout,
            submissions: (0..frames_in_flight).map(|_| None).collect(),
            next_image: 0,
        })
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}
