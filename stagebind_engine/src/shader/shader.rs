/// Shader stages and shader objects

use std::fmt;
use std::sync::Arc;
use bitflags::bitflags;
use crate::device::native::{NativeHandle, NativeSlot};
use crate::shader::shader_resources::{ShaderResourceDesc, ShaderResources};

/// Programmable pipeline stage
///
/// The discriminant is the stage index used by per-stage arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex = 0,
    Pixel = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
}

impl ShaderStage {
    pub const COUNT: usize = 6;

    pub const ALL: [ShaderStage; ShaderStage::COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn flag(self) -> ShaderStages {
        ShaderStages::from_bits_truncate(1 << self.index())
    }

    /// Unordered-access views exist for pixel and compute shaders only
    pub fn supports_unordered_access(self) -> bool {
        matches!(self, ShaderStage::Pixel | ShaderStage::Compute)
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Pixel => "Pixel",
            ShaderStage::Geometry => "Geometry",
            ShaderStage::Hull => "Hull",
            ShaderStage::Domain => "Domain",
            ShaderStage::Compute => "Compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of shader stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const GEOMETRY = 1 << 2;
        const HULL = 1 << 3;
        const DOMAIN = 1 << 4;
        const COMPUTE = 1 << 5;

        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::PIXEL.bits() | Self::GEOMETRY.bits()
            | Self::HULL.bits() | Self::DOMAIN.bits();
    }
}

impl ShaderStages {
    pub fn contains_stage(self, stage: ShaderStage) -> bool {
        self.contains(stage.flag())
    }

    /// Stages of the set in index order
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |stage| self.contains_stage(*stage))
    }
}

/// Shader creation parameters: stage plus reflected resource metadata
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub name: String,
    pub stage: ShaderStage,
    pub resources: Vec<ShaderResourceDesc>,
    /// Texture SRVs name the sampler they are sampled with; the sampler comes
    /// from the bound texture view instead of a separate variable
    pub combined_texture_samplers: bool,
}

impl ShaderDesc {
    pub fn new(name: impl Into<String>, stage: ShaderStage) -> Self {
        Self {
            name: name.into(),
            stage,
            resources: Vec::new(),
            combined_texture_samplers: false,
        }
    }

    pub fn with_resource(mut self, resource: ShaderResourceDesc) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_combined_texture_samplers(mut self) -> Self {
        self.combined_texture_samplers = true;
        self
    }
}

#[derive(Debug)]
pub struct Shader {
    resources: Arc<ShaderResources>,
    native: NativeSlot,
}

impl Shader {
    pub(crate) fn new(resources: ShaderResources, native: NativeSlot) -> Self {
        Self { resources: Arc::new(resources), native }
    }

    pub fn name(&self) -> &str {
        self.resources.shader_name()
    }

    pub fn stage(&self) -> ShaderStage {
        self.resources.stage()
    }

    pub fn resources(&self) -> &Arc<ShaderResources> {
        &self.resources
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}
