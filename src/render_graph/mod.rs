//! Dependency-ordered render passes over logical textures.
//!
//! A [`RenderGraph`] owns logical textures (the swapchain image plus any
//! graph-owned targets such as depth) and a list of passes. Each pass declares
//! which textures it writes and reads; baking sorts the passes so producers
//! run before consumers and rejects cycles. Every frame, [`RenderGraph::record`]
//! replays the baked order, opening a render pass per node and handing it the
//! frame's queued draw calls.
//!
//! ```text
//!  ┌──────────┐ writes  ┌───────────┐ reads  ┌──────────┐
//!  │  shadow  │───────▶ │ shadowmap │──────▶ │ gbuffer  │──▶ swapchain
//!  └──────────┘         └───────────┘        └──────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use kiln::render_graph::{GBufferNode, RenderGraph};
//!
//! let mut graph = RenderGraph::new(gpu.config.format);
//! let depth = graph.create_texture("depth", kiln::backend::DEPTH_FORMAT);
//! let pass = graph.create_pass("gbuffer", GBufferNode::new());
//! graph.write_texture(pass, graph.swapchain())?;
//! graph.write_texture(pass, depth)?;
//!
//! // Every frame:
//! graph.record(&gpu, &mut frame, image_index, slot, &resources, &mut draws)?;
//! ```

mod bake;
mod draw_queue;
mod gbuffer;
mod graph;
mod render_node;

pub use draw_queue::{DrawCall, DrawQueue, MeshId, MeshStore};
pub use gbuffer::GBufferNode;
pub use graph::{PassId, RenderGraph, TextureId};
pub use render_node::{FrameResources, PassContext, RenderNode};
