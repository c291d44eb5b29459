/// Shader module - stages, reflected resources and hardware slot limits

pub mod slot;
pub mod shader;
pub mod shader_resources;

pub use slot::{
    SlotKind, SlotCounts,
    MAX_CONSTANT_BUFFER_SLOTS, MAX_SHADER_RESOURCE_SLOTS, MAX_SAMPLER_SLOTS,
    MAX_UNORDERED_ACCESS_SLOTS, MAX_VERTEX_BUFFER_SLOTS, MAX_RENDER_TARGETS,
};
pub use shader::{Shader, ShaderDesc, ShaderStage, ShaderStages};
pub use shader_resources::{
    ResourceKind, VariableClass, VariableClasses,
    ShaderResourceDesc, ShaderResourceAttribs, ShaderResources,
};
