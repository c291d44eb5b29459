/// Binding module - caches, layouts, variables and the objects that own them

pub mod usage_state;
pub mod resource_cache;
pub mod resource_layout;
pub mod resource_mapping;
pub mod shader_variable;
pub mod pipeline;
pub mod shader_resource_binding;

pub use usage_state::{ResourceState, UsageStateTracker};
pub use resource_cache::{
    CachedConstantBuffer, CachedSampler, CachedView, CachedViewRef, ResourceCache,
};
pub use resource_layout::{AssignedSampler, LayoutVariable, ResourceLayout};
pub use resource_mapping::{BindShaderResourcesFlags, ResourceMapping};
pub use shader_variable::ShaderVariable;
pub use pipeline::{Pipeline, PipelineDesc};
pub use shader_resource_binding::ShaderResourceBinding;
