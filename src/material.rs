//! Materials: an effect plus per-instance bindings.
//!
//! ```text
//! { "red": (effect: "solid", color: [1.0, 0.0, 0.0, 1.0]) }
//! ```
//!
//! `color` is optional and defaults to opaque white. A material gets one
//! binding for every stage its effect provides a technique for.

use std::collections::HashMap;

use serde::Deserialize;

use crate::backend::Backend;
use crate::document::Table;
use crate::effect::{EffectId, EffectManager, RenderStage};
use crate::error::{EntryKind, Error, Result};

/// Per-material shader parameters (group 1, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialParams {
    pub color: [f32; 4],
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// One entry of the material document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MaterialDesc {
    pub effect: Option<String>,
    /// Three (opaque) or four channels.
    pub color: Option<Vec<f32>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

pub struct Material<B: Backend> {
    name: String,
    effect: EffectId,
    params: MaterialParams,
    bindings: [Option<B::MaterialBinding>; RenderStage::COUNT],
}

impl<B: Backend> Material<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effect(&self) -> EffectId {
        self.effect
    }

    pub fn params(&self) -> &MaterialParams {
        &self.params
    }

    pub fn binding(&self, stage: RenderStage) -> Option<&B::MaterialBinding> {
        self.bindings[stage.index()].as_ref()
    }
}

pub struct MaterialManager<B: Backend> {
    materials: Vec<Material<B>>,
    by_name: HashMap<String, MaterialId>,
}

impl<B: Backend> Default for MaterialManager<B> {
    fn default() -> Self {
        Self {
            materials: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<B: Backend> MaterialManager<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every material declared in `table`.
    ///
    /// `effect` is required and must name an effect loaded in `effects`.
    pub fn open(
        &mut self,
        backend: &B,
        effects: &EffectManager,
        table: &Table<MaterialDesc>,
    ) -> Result<usize> {
        let mut count = 0;

        for (name, entry) in table.iter() {
            let fail = |reason: String| Error::entry(EntryKind::Material, name, reason);

            let effect_name = entry
                .effect
                .as_deref()
                .ok_or_else(|| fail("missing key 'effect'".into()))?;
            let effect_id = effects
                .id(effect_name)
                .ok_or_else(|| fail(format!("unknown effect '{effect_name}'")))?;
            let effect = effects
                .get(effect_id)
                .ok_or_else(|| fail(format!("unknown effect '{effect_name}'")))?;

            let params = match &entry.color {
                None => MaterialParams::default(),
                Some(channels) => MaterialParams {
                    color: color(channels).ok_or_else(|| {
                        fail("'color' must be an array of three or four numbers".into())
                    })?,
                },
            };

            let mut bindings: [Option<B::MaterialBinding>; RenderStage::COUNT] =
                std::array::from_fn(|_| None);
            for stage in effect.stages() {
                let label = format!("{name}/{stage}");
                bindings[stage.index()] = Some(backend.create_material_binding(&label, &params)?);
            }

            let material = Material {
                name: name.to_owned(),
                effect: effect_id,
                params,
                bindings,
            };
            match self.by_name.get(name) {
                Some(&id) => self.materials[id.0] = material,
                None => {
                    self.by_name
                        .insert(name.to_owned(), MaterialId(self.materials.len()));
                    self.materials.push(material);
                }
            }
            log::debug!("loaded material '{name}' (effect '{effect_name}')");
            count += 1;
        }

        Ok(count)
    }

    pub fn lookup(&self, name: &str) -> Option<&Material<B>> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn id(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material<B>> {
        self.materials.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

fn color(channels: &[f32]) -> Option<[f32; 4]> {
    match *channels {
        [r, g, b] => Some([r, g, b, 1.0]),
        [r, g, b, a] => Some([r, g, b, a]),
        _ => None,
    }
}
