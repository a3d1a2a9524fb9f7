//! The built-in mesh pass.

use crate::backend::{Backend, PassEncoder};
use crate::effect::RenderStage;
use crate::error::Result;
use crate::render_graph::{PassContext, RenderNode};
use crate::technique::TechniqueId;

/// Draws every queued mesh with its material's gbuffer technique.
///
/// Uploads the camera once, then for each draw call binds the technique
/// (only when it changes), the per-frame resources, the material binding and
/// the model matrix before issuing an indexed draw. Draws whose material,
/// effect, technique or mesh cannot be resolved are skipped. Nothing is drawn
/// without a camera.
#[derive(Debug, Default)]
pub struct GBufferNode {
    skipped: usize,
}

impl GBufferNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend> RenderNode<B> for GBufferNode {
    fn record(&mut self, encoder: &mut dyn PassEncoder<B>, ctx: &PassContext<'_, B>) -> Result<()> {
        let res = ctx.resources;
        let Some(camera) = res.camera else {
            return Ok(());
        };
        encoder.upload_camera(&camera);

        let stage = RenderStage::GBuffer;
        let mut bound: Option<TechniqueId> = None;
        let mut skipped = 0;

        for call in ctx.draws {
            let Some(material) = res.materials.get(call.material) else {
                skipped += 1;
                continue;
            };
            let resolved = res
                .effects
                .get(material.effect())
                .and_then(|effect| effect.technique(stage))
                .and_then(|id| res.techniques.get(id).map(|t| (id, t)));
            let (Some((id, technique)), Some(binding), Some(mesh)) = (
                resolved,
                material.binding(stage),
                res.meshes.get(call.mesh),
            ) else {
                skipped += 1;
                continue;
            };

            if bound != Some(id) {
                encoder.bind_technique(technique.pipeline());
                encoder.bind_frame_resources(technique.pipeline());
                bound = Some(id);
            }
            encoder.bind_material(binding);
            encoder.push_model(&call.transform.matrix());
            encoder.draw_mesh(mesh);
        }

        if skipped != self.skipped {
            if skipped > 0 {
                log::debug!("gbuffer: skipped {skipped} unresolvable draw call(s)");
            }
            self.skipped = skipped;
        }
        Ok(())
    }
}
