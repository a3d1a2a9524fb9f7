//! Effects: which technique draws each render stage.
//!
//! ```text
//! { "solid": (gbuffer: "tri") }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::backend::Backend;
use crate::document::Table;
use crate::error::{EntryKind, Error, Result};
use crate::technique::{TechniqueId, TechniqueManager};

/// A logical render-pass stage a technique can be assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderStage {
    GBuffer,
}

impl RenderStage {
    pub const COUNT: usize = 1;
    pub const ALL: [RenderStage; Self::COUNT] = [RenderStage::GBuffer];

    /// The key naming this stage in effect documents.
    pub fn key(self) -> &'static str {
        match self {
            RenderStage::GBuffer => "gbuffer",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One entry of the effect document: a technique name per stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EffectDesc {
    pub gbuffer: Option<String>,
}

impl EffectDesc {
    pub fn technique(&self, stage: RenderStage) -> Option<&str> {
        match stage {
            RenderStage::GBuffer => self.gbuffer.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectId(pub(crate) usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Effect {
    name: String,
    techniques: [Option<TechniqueId>; RenderStage::COUNT],
}

impl Effect {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn technique(&self, stage: RenderStage) -> Option<TechniqueId> {
        self.techniques[stage.index()]
    }

    /// Stages this effect provides a technique for.
    pub fn stages(&self) -> impl Iterator<Item = RenderStage> + '_ {
        RenderStage::ALL
            .into_iter()
            .filter(|stage| self.technique(*stage).is_some())
    }
}

#[derive(Debug, Default)]
pub struct EffectManager {
    effects: Vec<Effect>,
    by_name: HashMap<String, EffectId>,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every effect declared in `table`.
    ///
    /// Each stage key must name a technique already loaded in `techniques`,
    /// and an effect must provide at least one stage. Keys that are not
    /// stage names are ignored.
    pub fn open<B: Backend>(
        &mut self,
        techniques: &TechniqueManager<B>,
        table: &Table<EffectDesc>,
    ) -> Result<usize> {
        let mut count = 0;

        for (name, entry) in table.iter() {
            let mut effect = Effect {
                name: name.to_owned(),
                techniques: [None; RenderStage::COUNT],
            };
            for stage in RenderStage::ALL {
                let Some(technique) = entry.technique(stage) else {
                    continue;
                };
                let id = techniques.id(technique).ok_or_else(|| {
                    Error::entry(
                        EntryKind::Effect,
                        name,
                        format!("unknown technique '{technique}' for stage '{stage}'"),
                    )
                })?;
                effect.techniques[stage.index()] = Some(id);
            }

            if effect.stages().next().is_none() {
                return Err(Error::entry(
                    EntryKind::Effect,
                    name,
                    "no render stage assigned (expected 'gbuffer')",
                ));
            }

            match self.by_name.get(name) {
                Some(&id) => self.effects[id.0] = effect,
                None => {
                    self.by_name
                        .insert(name.to_owned(), EffectId(self.effects.len()));
                    self.effects.push(effect);
                }
            }
            log::debug!("loaded effect '{name}'");
            count += 1;
        }

        Ok(count)
    }

    pub fn lookup(&self, name: &str) -> Option<&Effect> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn id(&self, name: &str) -> Option<EffectId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.effects.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
