/// Pipeline - shaders plus the static resources shared by every binding
///
/// Each active stage owns a static resource cache and a layout over the
/// stage's static variables. Static variables are bound through
/// `&mut Pipeline`; once the pipeline is shared behind an `Arc` they are
/// frozen, and shader resource bindings copy them as a snapshot.

use std::sync::Arc;
use crate::binding::resource_cache::ResourceCache;
use crate::binding::resource_layout::ResourceLayout;
use crate::binding::resource_mapping::{BindShaderResourcesFlags, ResourceMapping};
use crate::binding::shader_resource_binding::ShaderResourceBinding;
use crate::binding::shader_variable::ShaderVariable;
use crate::error::Result;
use crate::shader::{Shader, ShaderStage, ShaderStages, VariableClasses};
use crate::{engine_bail, engine_warn};

const SOURCE: &str = "stagebind::Pipeline";

/// Pipeline descriptor
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub name: String,
    /// One shader per stage; either a compute shader alone or graphics stages
    pub shaders: Vec<Arc<Shader>>,
}

impl PipelineDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), shaders: Vec::new() }
    }

    pub fn with_shader(mut self, shader: Arc<Shader>) -> Self {
        self.shaders.push(shader);
        self
    }
}

#[derive(Debug)]
pub(crate) struct PipelineStage {
    pub(crate) shader: Arc<Shader>,
    pub(crate) static_cache: ResourceCache,
    pub(crate) static_layout: ResourceLayout,
}

#[derive(Debug)]
pub struct Pipeline {
    name: String,
    /// Active stages in stage order
    stages: Vec<PipelineStage>,
    stage_indices: [Option<usize>; ShaderStage::COUNT],
    active_stages: ShaderStages,
}

impl Pipeline {
    /// Build a pipeline and size its static caches
    ///
    /// # Errors
    ///
    /// `InvalidResource` when no shader is given, two shaders share a stage,
    /// a compute shader is mixed with graphics stages, or a graphics
    /// pipeline has no vertex shader.
    pub fn new(desc: PipelineDesc) -> Result<Self> {
        if desc.shaders.is_empty() {
            engine_bail!(SOURCE, "Pipeline '{}' has no shaders", desc.name);
        }

        let mut by_stage: [Option<Arc<Shader>>; ShaderStage::COUNT] = Default::default();
        for shader in &desc.shaders {
            let entry = &mut by_stage[shader.stage().index()];
            if let Some(existing) = entry {
                engine_bail!(
                    SOURCE,
                    "Pipeline '{}' has two {} shaders: '{}' and '{}'",
                    desc.name, shader.stage(), existing.name(), shader.name()
                );
            }
            *entry = Some(shader.clone());
        }

        let has_compute = by_stage[ShaderStage::Compute.index()].is_some();
        if has_compute && desc.shaders.len() > 1 {
            engine_bail!(SOURCE, "Pipeline '{}' mixes a compute shader with graphics stages", desc.name);
        }
        if !has_compute && by_stage[ShaderStage::Vertex.index()].is_none() {
            engine_bail!(SOURCE, "Graphics pipeline '{}' has no vertex shader", desc.name);
        }

        let mut stages = Vec::new();
        let mut stage_indices = [None; ShaderStage::COUNT];
        let mut active_stages = ShaderStages::empty();
        for shader in by_stage.into_iter().flatten() {
            let mut static_cache = ResourceCache::new();
            let static_layout = ResourceLayout::new(shader.resources(), VariableClasses::STATIC, &mut static_cache)?;
            stage_indices[shader.stage().index()] = Some(stages.len());
            active_stages |= shader.stage().flag();
            stages.push(PipelineStage { shader, static_cache, static_layout });
        }

        crate::engine_debug!(
            SOURCE,
            "Pipeline '{}' created with stages {:?}",
            desc.name, active_stages
        );

        Ok(Self {
            name: desc.name,
            stages,
            stage_indices,
            active_stages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active_stages(&self) -> ShaderStages {
        self.active_stages
    }

    pub fn is_compute(&self) -> bool {
        self.active_stages.contains_stage(ShaderStage::Compute)
    }

    /// Position of `stage` among the active stages
    pub(crate) fn stage_slot(&self, stage: ShaderStage) -> Option<usize> {
        self.stage_indices[stage.index()]
    }

    pub(crate) fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<&Arc<Shader>> {
        self.stage_slot(stage).map(|i| &self.stages[i].shader)
    }

    // ===== STATIC VARIABLES =====

    pub fn static_variable_count(&self, stage: ShaderStage) -> usize {
        self.stage_slot(stage).map_or(0, |i| self.stages[i].static_layout.variable_count())
    }

    /// Static variable `name` of `stage`; inactive stages and unknown names
    /// are reported and yield `None`
    pub fn static_variable_by_name(&mut self, stage: ShaderStage, name: &str) -> Option<ShaderVariable<'_>> {
        let Some(slot) = self.stage_slot(stage) else {
            engine_warn!(SOURCE, "Unable to find static variable '{}': {} stage is inactive in pipeline '{}'", name, stage, self.name);
            return None;
        };
        let entry = &mut self.stages[slot];
        let Some(index) = entry.static_layout.variable_index(name) else {
            engine_warn!(SOURCE, "Static variable '{}' is not found in {} shader '{}'", name, stage, entry.shader.name());
            return None;
        };
        ShaderVariable::new(&entry.static_layout, &mut entry.static_cache, index)
    }

    pub fn static_variable_by_index(&mut self, stage: ShaderStage, index: usize) -> Option<ShaderVariable<'_>> {
        let Some(slot) = self.stage_slot(stage) else {
            engine_warn!(SOURCE, "Unable to find static variable #{}: {} stage is inactive in pipeline '{}'", index, stage, self.name);
            return None;
        };
        let entry = &mut self.stages[slot];
        let variable = ShaderVariable::new(&entry.static_layout, &mut entry.static_cache, index);
        if variable.is_none() {
            engine_warn!(
                SOURCE,
                "Static variable index {} is out of range: {} shader '{}' has {} static variables",
                index, stage, entry.shader.name(), entry.static_layout.variable_count()
            );
        }
        variable
    }

    /// Bind static variables of every active stage in `stages` from `mapping`
    pub fn bind_static_resources(&mut self, stages: ShaderStages, mapping: &ResourceMapping, flags: BindShaderResourcesFlags) {
        for entry in self.stages.iter_mut().filter(|e| stages.contains_stage(e.shader.stage())) {
            entry.static_layout.bind_resources(mapping, flags, &mut entry.static_cache);
        }
    }

    pub fn static_cache(&self, stage: ShaderStage) -> Option<&ResourceCache> {
        self.stage_slot(stage).map(|i| &self.stages[i].static_cache)
    }

    pub fn static_layout(&self, stage: ShaderStage) -> Option<&ResourceLayout> {
        self.stage_slot(stage).map(|i| &self.stages[i].static_layout)
    }

    /// Log every unbound static variable; true when all are bound
    pub fn verify_static_bindings(&self) -> bool {
        self.stages
            .iter()
            .fold(true, |all_bound, e| e.static_layout.verify_bindings(&e.static_cache) && all_bound)
    }

    // ===== BINDINGS =====

    /// New shader resource binding; `init_static_resources` copies the
    /// static resources right away
    pub fn create_shader_resource_binding(self: &Arc<Self>, init_static_resources: bool) -> Result<ShaderResourceBinding> {
        ShaderResourceBinding::new(self.clone(), init_static_resources)
    }

    /// Bindings created from `other` can be committed with this pipeline
    ///
    /// True when both pipelines have the same active stages and every stage
    /// declares the same resources.
    pub fn is_compatible_with(&self, other: &Pipeline) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.active_stages == other.active_stages
            && self.stages.iter().zip(&other.stages).all(|(a, b)| {
                Arc::ptr_eq(a.shader.resources(), b.shader.resources())
                    || a.shader.resources().resources() == b.shader.resources().resources()
            })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
