//! The core render node trait for the render graph.

use crate::backend::{Backend, Extent, PassEncoder};
use crate::camera::CameraUniform;
use crate::effect::EffectManager;
use crate::error::Result;
use crate::material::MaterialManager;
use crate::render_graph::{DrawCall, MeshStore};
use crate::technique::TechniqueManager;

/// Everything a pass may draw with this frame.
pub struct FrameResources<'a, B: Backend> {
    pub techniques: &'a TechniqueManager<B>,
    pub effects: &'a EffectManager,
    pub materials: &'a MaterialManager<B>,
    pub meshes: &'a MeshStore<B>,
    /// The active camera, if any. Mesh passes draw nothing without one.
    pub camera: Option<CameraUniform>,
}

/// Per-pass view of the frame being recorded.
pub struct PassContext<'a, B: Backend> {
    /// In-flight frame slot, `0..frames_in_flight`.
    pub frame_slot: usize,
    /// Swapchain image the frame renders to.
    pub image_index: u32,
    pub extent: Extent,
    pub resources: &'a FrameResources<'a, B>,
    /// Draw calls queued for this frame.
    pub draws: &'a [DrawCall],
}

/// Trait for render graph nodes that record GPU commands.
///
/// The graph opens a render pass on the node's framebuffer, calls
/// [`record`](Self::record) once, and closes the pass. Nodes are recorded in
/// baked order, so everything a node reads has already been written.
///
/// # Implementing Custom Nodes
///
/// ```ignore
/// struct Overlay {
///     technique: TechniqueId,
///     mesh: MeshId,
/// }
///
/// impl<B: Backend> RenderNode<B> for Overlay {
///     fn record(&mut self, encoder: &mut dyn PassEncoder<B>, ctx: &PassContext<'_, B>) -> Result<()> {
///         let res = ctx.resources;
///         if let (Some(t), Some(mesh)) = (res.techniques.get(self.technique), res.meshes.get(self.mesh)) {
///             encoder.bind_technique(t.pipeline());
///             encoder.bind_frame_resources(t.pipeline());
///             encoder.draw_mesh(mesh);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait RenderNode<B: Backend> {
    /// Records this node's commands into the open pass.
    ///
    /// An error aborts recording of the rest of the frame.
    fn record(&mut self, encoder: &mut dyn PassEncoder<B>, ctx: &PassContext<'_, B>)
    -> Result<()>;
}

/// Adapts a closure into a [`RenderNode`].
pub(crate) struct FnNode<F>(pub F);

impl<B, F> RenderNode<B> for FnNode<F>
where
    B: Backend,
    F: FnMut(&mut dyn PassEncoder<B>, &PassContext<'_, B>) -> Result<()>,
{
    fn record(
        &mut self,
        encoder: &mut dyn PassEncoder<B>,
        ctx: &PassContext<'_, B>,
    ) -> Result<()> {
        (self.0)(encoder, ctx)
    }
}
