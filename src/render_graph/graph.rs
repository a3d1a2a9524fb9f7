//! The render graph: logical textures, passes, bake and record.

use std::collections::HashSet;

use crate::backend::{
    AttachmentTarget, Backend, ColorAttachment, DepthAttachment, FramebufferDesc, PassEncoder,
};
use crate::error::{Error, Result};
use crate::render_graph::bake::{self, PassIo};
use crate::render_graph::render_node::FnNode;
use crate::render_graph::{DrawQueue, FrameResources, PassContext, RenderNode};

/// Handle to a logical texture owned by a [`RenderGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) usize);

/// Handle to a pass. Ids follow insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) usize);

enum TextureKind<B: Backend> {
    /// Resolved per frame to the acquired swapchain image.
    Swapchain,
    /// Allocated at swapchain resolution on first use and on rebuild.
    Owned(Option<B::Texture>),
}

struct LogicalTexture<B: Backend> {
    name: String,
    format: wgpu::TextureFormat,
    kind: TextureKind<B>,
}

struct PassNode<B: Backend> {
    label: String,
    node: Box<dyn RenderNode<B>>,
}

/// A dependency-ordered set of passes over shared logical textures.
///
/// Passes declare the textures they write and read. [`bake`](Self::bake)
/// orders them so every writer of a texture runs before its readers; the
/// order is replayed by [`record`](Self::record) every frame.
///
/// Changing the structure only marks the graph dirty. The next `record`
/// re-bakes first, so building a graph of N passes costs one bake, not N.
///
/// ```ignore
/// let mut graph = RenderGraph::new(surface.color_format);
/// let depth = graph.create_texture("depth", DEPTH_FORMAT);
/// let gbuffer = graph.create_pass("gbuffer", GBufferNode::new());
/// graph.write_texture(gbuffer, graph.swapchain())?;
/// graph.write_texture(gbuffer, depth)?;
/// graph.bake()?;
/// ```
pub struct RenderGraph<B: Backend> {
    textures: Vec<LogicalTexture<B>>,
    nodes: Vec<PassNode<B>>,
    ios: Vec<PassIo>,
    baked: Vec<PassId>,
    dirty: bool,
    /// Indexed by pass, then by swapchain image.
    framebuffers: Vec<Vec<B::Framebuffer>>,
    targets_stale: bool,
    swapchain: TextureId,
}

impl<B: Backend> RenderGraph<B> {
    /// Creates a graph containing only the swapchain texture.
    pub fn new(swapchain_format: wgpu::TextureFormat) -> Self {
        Self {
            textures: vec![LogicalTexture {
                name: "swapchain".to_owned(),
                format: swapchain_format,
                kind: TextureKind::Swapchain,
            }],
            nodes: Vec::new(),
            ios: Vec::new(),
            baked: Vec::new(),
            dirty: true,
            framebuffers: Vec::new(),
            targets_stale: true,
            swapchain: TextureId(0),
        }
    }

    /// The texture standing for the current swapchain image.
    pub fn swapchain(&self) -> TextureId {
        self.swapchain
    }

    /// Declares a graph-owned texture at swapchain resolution.
    ///
    /// Depth formats are bound as the depth attachment of passes that
    /// write them; anything else is a color attachment.
    pub fn create_texture(&mut self, name: &str, format: wgpu::TextureFormat) -> TextureId {
        let id = TextureId(self.textures.len());
        self.textures.push(LogicalTexture {
            name: name.to_owned(),
            format,
            kind: TextureKind::Owned(None),
        });
        self.targets_stale = true;
        id
    }

    /// Adds a pass. It takes part in the next bake.
    pub fn create_pass(&mut self, label: &str, node: impl RenderNode<B> + 'static) -> PassId {
        let id = PassId(self.nodes.len());
        self.nodes.push(PassNode {
            label: label.to_owned(),
            node: Box::new(node),
        });
        self.ios.push(PassIo::default());
        self.dirty = true;
        id
    }

    /// Adds a pass whose commands are recorded by `record`.
    pub fn create_pass_fn<F>(&mut self, label: &str, record: F) -> PassId
    where
        F: FnMut(&mut dyn PassEncoder<B>, &PassContext<'_, B>) -> Result<()> + 'static,
    {
        self.create_pass(label, FnNode(record))
    }

    /// Declares that `pass` writes `texture`.
    pub fn write_texture(&mut self, pass: PassId, texture: TextureId) -> Result<()> {
        self.check(pass, texture)?;
        let writes = &mut self.ios[pass.0].writes;
        if !writes.contains(&texture) {
            writes.push(texture);
            self.dirty = true;
        }
        Ok(())
    }

    /// Declares that `pass` reads `texture`, so it runs after every writer.
    pub fn read_texture(&mut self, pass: PassId, texture: TextureId) -> Result<()> {
        self.check(pass, texture)?;
        let reads = &mut self.ios[pass.0].reads;
        if !reads.contains(&texture) {
            reads.push(texture);
            self.dirty = true;
        }
        Ok(())
    }

    fn check(&self, pass: PassId, texture: TextureId) -> Result<()> {
        if pass.0 >= self.nodes.len() {
            return Err(Error::InvalidUsage(format!("unknown pass {pass:?}")));
        }
        if texture.0 >= self.textures.len() {
            return Err(Error::InvalidUsage(format!("unknown texture {texture:?}")));
        }
        Ok(())
    }

    /// Sorts passes into execution order.
    ///
    /// # Errors
    ///
    /// [`Error::CyclicRenderGraph`] naming a pass on the cycle. The previous
    /// order is kept but the graph stays dirty, so [`record`](Self::record)
    /// keeps failing until the cycle is removed.
    pub fn bake(&mut self) -> Result<&[PassId]> {
        match bake::bake(&self.ios) {
            Ok(order) => {
                log::debug!(
                    "baked render graph: [{}]",
                    order
                        .iter()
                        .map(|p| self.nodes[p.0].label.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.baked = order;
                self.dirty = false;
                self.targets_stale = true;
                Ok(&self.baked)
            }
            Err(pass) => {
                let pass = self.nodes[pass.0].label.clone();
                log::error!("render graph has a cycle through pass '{pass}'");
                Err(Error::CyclicRenderGraph { pass })
            }
        }
    }

    pub fn baked_order(&self) -> &[PassId] {
        &self.baked
    }

    /// Whether the structure changed since the last successful bake.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pass_label(&self, pass: PassId) -> Option<&str> {
        self.nodes.get(pass.0).map(|p| p.label.as_str())
    }

    pub fn texture_name(&self, texture: TextureId) -> Option<&str> {
        self.textures.get(texture.0).map(|t| t.name.as_str())
    }

    pub fn pass_count(&self) -> usize {
        self.nodes.len()
    }

    /// Records every baked pass into `frame`, then empties `draws`.
    ///
    /// Bakes first if the graph is dirty and (re)creates textures and
    /// framebuffers if they are stale. The draw queue is cleared even when
    /// recording fails, so queued draws never leak into the next frame.
    pub fn record(
        &mut self,
        backend: &B,
        frame: &mut B::Frame,
        image_index: u32,
        frame_slot: usize,
        resources: &FrameResources<'_, B>,
        draws: &mut DrawQueue,
    ) -> Result<()> {
        let result = self.record_passes(
            backend,
            frame,
            image_index,
            frame_slot,
            resources,
            draws,
        );
        draws.clear();
        result
    }

    fn record_passes(
        &mut self,
        backend: &B,
        frame: &mut B::Frame,
        image_index: u32,
        frame_slot: usize,
        resources: &FrameResources<'_, B>,
        draws: &DrawQueue,
    ) -> Result<()> {
        if self.dirty {
            self.bake()?;
        }
        self.prepare_targets(backend)?;

        let extent = backend.surface().extent;
        for &pass in &self.baked {
            let framebuffer = self.framebuffers[pass.0]
                .get(image_index as usize)
                .ok_or_else(|| {
                    Error::InvalidUsage(format!("swapchain image {image_index} out of range"))
                })?;
            let PassNode { label, node } = &mut self.nodes[pass.0];
            let ctx = PassContext {
                frame_slot,
                image_index,
                extent,
                resources,
                draws: draws.calls(),
            };
            backend.record_pass(frame, framebuffer, label, &mut |encoder| {
                node.record(encoder, &ctx)
            })?;
        }
        Ok(())
    }

    /// Recreates resolution-dependent resources after a resize.
    ///
    /// Graph-owned textures and per-image framebuffers are rebuilt; the baked
    /// order is left alone.
    pub fn rebuild(&mut self, backend: &B) -> Result<()> {
        for texture in &mut self.textures {
            if let TextureKind::Owned(slot) = &mut texture.kind {
                *slot = None;
            }
        }
        self.framebuffers.clear();
        self.targets_stale = true;
        if self.dirty {
            // Framebuffers depend on the order; the next record bakes and builds them.
            return Ok(());
        }
        self.prepare_targets(backend)
    }

    fn prepare_targets(&mut self, backend: &B) -> Result<()> {
        if !self.targets_stale {
            return Ok(());
        }
        let surface = backend.surface();

        for texture in &mut self.textures {
            if let TextureKind::Owned(slot @ None) = &mut texture.kind {
                *slot = Some(backend.create_texture(
                    &texture.name,
                    texture.format,
                    surface.extent,
                )?);
            }
        }

        // The first pass in baked order to write a texture clears it.
        let mut written = HashSet::new();
        let mut framebuffers: Vec<Vec<B::Framebuffer>> =
            (0..self.nodes.len()).map(|_| Vec::new()).collect();

        for &pass in &self.baked {
            let label = &self.nodes[pass.0].label;
            let writes = &self.ios[pass.0].writes;
            if writes.is_empty() {
                return Err(Error::InvalidUsage(format!("pass '{label}' writes no textures")));
            }
            let clears: Vec<(TextureId, bool)> =
                writes.iter().map(|&t| (t, written.insert(t))).collect();

            for image_index in 0..surface.image_count {
                let mut colors = Vec::new();
                let mut depth = None;
                for &(id, clear) in &clears {
                    let texture = &self.textures[id.0];
                    match &texture.kind {
                        TextureKind::Swapchain => colors.push(ColorAttachment {
                            target: AttachmentTarget::Swapchain,
                            clear,
                        }),
                        TextureKind::Owned(Some(owned))
                            if texture.format.is_depth_stencil_format() =>
                        {
                            if depth.is_some() {
                                return Err(Error::InvalidUsage(format!(
                                    "pass '{label}' writes more than one depth texture"
                                )));
                            }
                            depth = Some(DepthAttachment {
                                texture: owned,
                                clear,
                            });
                        }
                        TextureKind::Owned(Some(owned)) => colors.push(ColorAttachment {
                            target: AttachmentTarget::Texture(owned),
                            clear,
                        }),
                        TextureKind::Owned(None) => {
                            return Err(Error::InvalidUsage(format!(
                                "texture '{}' was not allocated",
                                texture.name
                            )));
                        }
                    }
                }

                framebuffers[pass.0].push(backend.create_framebuffer(&FramebufferDesc {
                    label,
                    image_index,
                    colors,
                    depth,
                    extent: surface.extent,
                })?);
            }
        }

        self.framebuffers = framebuffers;
        self.targets_stale = false;
        Ok(())
    }
}
