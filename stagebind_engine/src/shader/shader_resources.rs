/// Reflected shader resources
///
/// A shader declares the resources it reads and writes: constant buffers,
/// texture and buffer views, samplers. [`ShaderResources`] validates that
/// declaration once, at shader creation, so caches and layouts built from it
/// can rely on bind ranges being in hardware limits and non-overlapping.

use std::fmt;
use std::ops::Range;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::engine_bail;
use crate::shader::shader::{ShaderDesc, ShaderStage};
use crate::shader::slot::{SlotCounts, SlotKind};

// ===== RESOURCE KIND =====

/// Kind of a shader resource variable
///
/// Declaration order is the order in which layouts store their variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ConstantBuffer,
    TextureSrv,
    TextureUav,
    BufferSrv,
    BufferUav,
    Sampler,
}

impl ResourceKind {
    pub const COUNT: usize = 6;

    pub const ALL: [ResourceKind; ResourceKind::COUNT] = [
        ResourceKind::ConstantBuffer,
        ResourceKind::TextureSrv,
        ResourceKind::TextureUav,
        ResourceKind::BufferSrv,
        ResourceKind::BufferUav,
        ResourceKind::Sampler,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Hardware slot array the variable occupies
    pub fn slot_kind(self) -> SlotKind {
        match self {
            ResourceKind::ConstantBuffer => SlotKind::ConstantBuffer,
            ResourceKind::TextureSrv | ResourceKind::BufferSrv => SlotKind::ShaderResource,
            ResourceKind::TextureUav | ResourceKind::BufferUav => SlotKind::UnorderedAccess,
            ResourceKind::Sampler => SlotKind::Sampler,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ConstantBuffer => "constant buffer",
            ResourceKind::TextureSrv => "texture SRV",
            ResourceKind::TextureUav => "texture UAV",
            ResourceKind::BufferSrv => "buffer SRV",
            ResourceKind::BufferUav => "buffer UAV",
            ResourceKind::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

// ===== VARIABLE CLASS =====

/// How often a variable's binding is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum VariableClass {
    /// Bound once on the pipeline, shared by every binding object
    Static,
    /// Bound once per shader resource binding object
    #[default]
    Mutable,
    /// Rebindable at any time
    Dynamic,
}

impl VariableClass {
    pub const ALL: [VariableClass; 3] = [VariableClass::Static, VariableClass::Mutable, VariableClass::Dynamic];

    pub fn flag(self) -> VariableClasses {
        match self {
            VariableClass::Static => VariableClasses::STATIC,
            VariableClass::Mutable => VariableClasses::MUTABLE,
            VariableClass::Dynamic => VariableClasses::DYNAMIC,
        }
    }
}

impl fmt::Display for VariableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableClass::Static => "static",
            VariableClass::Mutable => "mutable",
            VariableClass::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of variable classes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VariableClasses: u32 {
        const STATIC = 1 << 0;
        const MUTABLE = 1 << 1;
        const DYNAMIC = 1 << 2;
    }
}

impl VariableClasses {
    pub fn contains_class(self, class: VariableClass) -> bool {
        self.contains(class.flag())
    }
}

// ===== RESOURCE DESCRIPTION =====

/// One reflected resource, as declared by the shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResourceDesc {
    pub name: String,
    pub kind: ResourceKind,
    pub bind_point: u32,
    /// Array size; consecutive slots starting at `bind_point`
    pub bind_count: u32,
    pub class: VariableClass,
    /// Sampler variable a texture SRV is sampled with (combined samplers only)
    pub assigned_sampler: Option<String>,
}

impl ShaderResourceDesc {
    /// Single-element mutable resource
    pub fn new(name: impl Into<String>, kind: ResourceKind, bind_point: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            bind_point,
            bind_count: 1,
            class: VariableClass::default(),
            assigned_sampler: None,
        }
    }

    pub fn with_count(mut self, bind_count: u32) -> Self {
        self.bind_count = bind_count;
        self
    }

    pub fn with_class(mut self, class: VariableClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_sampler(mut self, sampler: impl Into<String>) -> Self {
        self.assigned_sampler = Some(sampler.into());
        self
    }
}

/// Validated resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResourceAttribs {
    pub name: String,
    pub kind: ResourceKind,
    pub bind_point: u32,
    pub bind_count: u32,
    pub class: VariableClass,
    /// Index of the assigned sampler in [`ShaderResources::resources`]
    pub sampler_index: Option<usize>,
}

impl ShaderResourceAttribs {
    /// One past the last slot occupied by the resource
    pub fn end_slot(&self) -> u32 {
        self.bind_point + self.bind_count
    }

    pub fn slot_range(&self) -> Range<u32> {
        self.bind_point..self.end_slot()
    }
}

// ===== SHADER RESOURCES =====

const SOURCE: &str = "stagebind::ShaderResources";

/// Validated resource set of one shader, grouped by [`ResourceKind`]
#[derive(Debug, Clone)]
pub struct ShaderResources {
    shader_name: String,
    stage: ShaderStage,
    combined_texture_samplers: bool,
    resources: Vec<ShaderResourceAttribs>,
    kind_ranges: [Range<usize>; ResourceKind::COUNT],
}

impl ShaderResources {
    /// Validate a shader's reflected resources
    ///
    /// # Errors
    ///
    /// `InvalidResource` when a bind count is zero, a range leaves the
    /// hardware limits or overlaps another range of the same slot kind, a
    /// name repeats, a UAV appears outside the pixel/compute stage, or an
    /// assigned sampler does not resolve.
    pub fn new(desc: &ShaderDesc) -> Result<Self> {
        let mut sorted: Vec<&ShaderResourceDesc> = desc.resources.iter().collect();
        // Stable: declaration order is kept within each kind
        sorted.sort_by_key(|res| res.kind);

        let mut names: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, res) in sorted.iter().enumerate() {
            if names.insert(res.name.as_str(), index).is_some() {
                engine_bail!(SOURCE, "Shader '{}' declares resource '{}' more than once", desc.name, res.name);
            }
            Self::validate_range(desc, res)?;
        }

        Self::validate_overlaps(desc, &sorted)?;

        let mut resources = Vec::with_capacity(sorted.len());
        for res in &sorted {
            let sampler_index = match &res.assigned_sampler {
                None => None,
                Some(sampler_name) => Some(Self::resolve_sampler(desc, res, sampler_name, &sorted, &names)?),
            };
            resources.push(ShaderResourceAttribs {
                name: res.name.clone(),
                kind: res.kind,
                bind_point: res.bind_point,
                bind_count: res.bind_count,
                class: res.class,
                sampler_index,
            });
        }

        let kind_ranges = std::array::from_fn(|kind_index| {
            let start = resources.iter().position(|r| r.kind.index() >= kind_index).unwrap_or(resources.len());
            let end = resources.iter().position(|r| r.kind.index() > kind_index).unwrap_or(resources.len());
            start..end
        });

        Ok(Self {
            shader_name: desc.name.clone(),
            stage: desc.stage,
            combined_texture_samplers: desc.combined_texture_samplers,
            resources,
            kind_ranges,
        })
    }

    fn validate_range(desc: &ShaderDesc, res: &ShaderResourceDesc) -> Result<()> {
        if res.bind_count == 0 {
            engine_bail!(SOURCE, "Resource '{}' in shader '{}' has a bind count of zero", res.name, desc.name);
        }
        let slot_kind = res.kind.slot_kind();
        let end = res.bind_point as u64 + res.bind_count as u64;
        if end > slot_kind.max_slots() as u64 {
            engine_bail!(
                SOURCE,
                "Resource '{}' in shader '{}' occupies {} slots {}..{}, but only {} are available",
                res.name, desc.name, slot_kind, res.bind_point, end, slot_kind.max_slots()
            );
        }
        if slot_kind == SlotKind::UnorderedAccess && !desc.stage.supports_unordered_access() {
            engine_bail!(
                SOURCE,
                "Resource '{}': unordered access views are not supported in {} shader '{}'",
                res.name, desc.stage, desc.name
            );
        }
        if res.assigned_sampler.is_some() && res.kind != ResourceKind::TextureSrv {
            engine_bail!(SOURCE, "Only texture SRVs can have an assigned sampler ('{}' is a {})", res.name, res.kind);
        }
        Ok(())
    }

    fn validate_overlaps(desc: &ShaderDesc, sorted: &[&ShaderResourceDesc]) -> Result<()> {
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                if a.kind.slot_kind() != b.kind.slot_kind() {
                    continue;
                }
                let a_end = a.bind_point + a.bind_count;
                let b_end = b.bind_point + b.bind_count;
                if a.bind_point < b_end && b.bind_point < a_end {
                    engine_bail!(
                        SOURCE,
                        "Resources '{}' and '{}' in shader '{}' overlap in {} slots",
                        a.name, b.name, desc.name, a.kind.slot_kind()
                    );
                }
            }
        }
        Ok(())
    }

    fn resolve_sampler(
        desc: &ShaderDesc,
        texture: &ShaderResourceDesc,
        sampler_name: &str,
        sorted: &[&ShaderResourceDesc],
        names: &FxHashMap<&str, usize>,
    ) -> Result<usize> {
        if !desc.combined_texture_samplers {
            engine_bail!(
                SOURCE,
                "Texture '{}' assigns sampler '{}', but shader '{}' does not use combined texture samplers",
                texture.name, sampler_name, desc.name
            );
        }
        let Some(&index) = names.get(sampler_name) else {
            engine_bail!(SOURCE, "Sampler '{}' assigned to texture '{}' is not declared", sampler_name, texture.name);
        };
        let sampler = sorted[index];
        if sampler.kind != ResourceKind::Sampler {
            engine_bail!(SOURCE, "'{}' assigned to texture '{}' is not a sampler", sampler_name, texture.name);
        }
        if sampler.class != texture.class {
            engine_bail!(
                SOURCE,
                "Sampler '{}' is {} but texture '{}' is {}",
                sampler_name, sampler.class, texture.name, texture.class
            );
        }
        if sampler.bind_count != 1 && sampler.bind_count != texture.bind_count {
            engine_bail!(
                SOURCE,
                "Sampler '{}' array size {} does not match texture '{}' array size {}",
                sampler_name, sampler.bind_count, texture.name, texture.bind_count
            );
        }
        Ok(index)
    }

    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn is_using_combined_texture_samplers(&self) -> bool {
        self.combined_texture_samplers
    }

    pub fn resources(&self) -> &[ShaderResourceAttribs] {
        &self.resources
    }

    pub fn resource(&self, index: usize) -> Option<&ShaderResourceAttribs> {
        self.resources.get(index)
    }

    pub fn resources_of_kind(&self, kind: ResourceKind) -> &[ShaderResourceAttribs] {
        &self.resources[self.kind_ranges[kind.index()].clone()]
    }

    /// Index range of `kind` within [`Self::resources`]
    pub fn kind_range(&self, kind: ResourceKind) -> Range<usize> {
        self.kind_ranges[kind.index()].clone()
    }

    pub fn count_by_class(&self, class: VariableClass) -> usize {
        self.resources.iter().filter(|r| r.class == class).count()
    }

    /// Slot counts a cache needs to hold every resource of `classes`
    ///
    /// Assigned samplers count toward the sampler slots of their texture.
    pub fn slot_counts(&self, classes: VariableClasses) -> SlotCounts {
        let mut counts = SlotCounts::default();
        for res in self.resources.iter().filter(|r| classes.contains_class(r.class)) {
            counts.include(res.kind.slot_kind(), res.end_slot());
            if let Some(sampler) = res.sampler_index.and_then(|i| self.resources.get(i)) {
                counts.include(SlotKind::Sampler, sampler.end_slot());
            }
        }
        counts
    }
}

#[cfg(test)]
#[path = "shader_resources_tests.rs"]
mod tests;
