/// Shader resource binding (SRB) - per-instance resources of a pipeline
///
/// One cache per active stage, sized for every variable class, plus a layout
/// exposing the mutable and dynamic variables. Static slots are filled once
/// from the pipeline by [`ShaderResourceBinding::bind_static_resources`].

use std::sync::Arc;
use crate::binding::pipeline::Pipeline;
use crate::binding::resource_cache::ResourceCache;
use crate::binding::resource_layout::ResourceLayout;
use crate::binding::resource_mapping::{BindShaderResourcesFlags, ResourceMapping};
use crate::binding::shader_variable::ShaderVariable;
use crate::error::Result;
use crate::shader::{ShaderStage, ShaderStages, VariableClasses};
use crate::{engine_bail, engine_warn};

const SOURCE: &str = "stagebind::ShaderResourceBinding";

#[derive(Debug)]
struct SrbStage {
    stage: ShaderStage,
    cache: ResourceCache,
    layout: ResourceLayout,
}

#[derive(Debug)]
pub struct ShaderResourceBinding {
    pipeline: Arc<Pipeline>,
    /// Same order as the pipeline's active stages
    stages: Vec<SrbStage>,
    static_resources_bound: bool,
}

impl ShaderResourceBinding {
    pub(crate) fn new(pipeline: Arc<Pipeline>, init_static_resources: bool) -> Result<Self> {
        let mut stages = Vec::with_capacity(pipeline.stages().len());
        for entry in pipeline.stages() {
            let resources = entry.shader.resources();
            let mut cache = ResourceCache::with_counts(resources.slot_counts(VariableClasses::all()))?;
            let layout = ResourceLayout::new(
                resources,
                VariableClasses::MUTABLE | VariableClasses::DYNAMIC,
                &mut cache,
            )?;
            stages.push(SrbStage { stage: entry.shader.stage(), cache, layout });
        }

        let mut srb = Self {
            pipeline,
            stages,
            static_resources_bound: false,
        };
        if init_static_resources {
            srb.bind_static_resources()?;
        }
        Ok(srb)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn active_stages(&self) -> ShaderStages {
        self.pipeline.active_stages()
    }

    pub fn static_resources_bound(&self) -> bool {
        self.static_resources_bound
    }

    fn stage_entry(&self, stage: ShaderStage) -> Option<&SrbStage> {
        self.pipeline.stage_slot(stage).map(|i| &self.stages[i])
    }

    fn stage_entry_mut(&mut self, stage: ShaderStage) -> Option<&mut SrbStage> {
        match self.pipeline.stage_slot(stage) {
            Some(i) => Some(&mut self.stages[i]),
            None => None,
        }
    }

    /// Copy the pipeline's static resources into this binding
    ///
    /// Missing static bindings are reported before the copy.
    ///
    /// # Errors
    ///
    /// `UsageError` if static resources were already bound; nothing changes.
    pub fn bind_static_resources(&mut self) -> Result<()> {
        if self.static_resources_bound {
            engine_bail!(
                @UsageError, SOURCE,
                "Static resources have already been bound to this binding of pipeline '{}'",
                self.pipeline.name()
            );
        }

        self.pipeline.verify_static_bindings();
        for (entry, srb_stage) in self.pipeline.stages().iter().zip(self.stages.iter_mut()) {
            entry.static_layout.copy_resources(&entry.static_cache, &mut srb_stage.cache);
        }
        self.static_resources_bound = true;
        Ok(())
    }

    /// Bind mutable and dynamic variables of every active stage in `stages`
    pub fn bind_resources(&mut self, stages: ShaderStages, mapping: &ResourceMapping, flags: BindShaderResourcesFlags) {
        for srb_stage in self.stages.iter_mut().filter(|s| stages.contains_stage(s.stage)) {
            srb_stage.layout.bind_resources(mapping, flags, &mut srb_stage.cache);
        }
    }

    pub fn variable_count(&self, stage: ShaderStage) -> usize {
        self.stage_entry(stage).map_or(0, |s| s.layout.variable_count())
    }

    /// Mutable or dynamic variable `name` of `stage`
    pub fn variable_by_name(&mut self, stage: ShaderStage, name: &str) -> Option<ShaderVariable<'_>> {
        let pipeline_name = self.pipeline.name().to_string();
        let Some(srb_stage) = self.stage_entry_mut(stage) else {
            engine_warn!(
                SOURCE,
                "Unable to find variable '{}': {} stage is inactive in pipeline '{}'",
                name, stage, pipeline_name
            );
            return None;
        };
        let Some(index) = srb_stage.layout.variable_index(name) else {
            engine_warn!(
                SOURCE,
                "Mutable or dynamic variable '{}' is not found in {} shader '{}'",
                name, stage, srb_stage.layout.shader_resources().shader_name()
            );
            return None;
        };
        ShaderVariable::new(&srb_stage.layout, &mut srb_stage.cache, index)
    }

    pub fn variable_by_index(&mut self, stage: ShaderStage, index: usize) -> Option<ShaderVariable<'_>> {
        let pipeline_name = self.pipeline.name().to_string();
        let Some(srb_stage) = self.stage_entry_mut(stage) else {
            engine_warn!(
                SOURCE,
                "Unable to find variable #{}: {} stage is inactive in pipeline '{}'",
                index, stage, pipeline_name
            );
            return None;
        };
        let count = srb_stage.layout.variable_count();
        let variable = ShaderVariable::new(&srb_stage.layout, &mut srb_stage.cache, index);
        if variable.is_none() {
            engine_warn!(SOURCE, "Variable index {} is out of range: {} stage has {} variables", index, stage, count);
        }
        variable
    }

    pub fn resource_cache(&self, stage: ShaderStage) -> Option<&ResourceCache> {
        self.stage_entry(stage).map(|s| &s.cache)
    }

    pub fn resource_layout(&self, stage: ShaderStage) -> Option<&ResourceLayout> {
        self.stage_entry(stage).map(|s| &s.layout)
    }

    /// Caches of the active stages, in stage order
    pub fn stage_caches(&self) -> impl Iterator<Item = (ShaderStage, &ResourceCache)> {
        self.stages.iter().map(|s| (s.stage, &s.cache))
    }

    /// Log every unbound mutable or dynamic variable; true when all are bound
    pub fn verify_bindings(&self) -> bool {
        self.stages
            .iter()
            .fold(true, |all_bound, s| s.layout.verify_bindings(&s.cache) && all_bound)
    }
}

#[cfg(test)]
#[path = "shader_resource_binding_tests.rs"]
mod tests;
