/// Render device - factory for every engine-level object
///
/// The device validates creation parameters, allocates a native handle for
/// each object and hands out execution contexts wired to a native context
/// implementation.

use std::sync::Arc;
use crate::binding::pipeline::{Pipeline, PipelineDesc};
use crate::config::Config;
use crate::context::{ContextKind, DeviceContext, NativeContext};
use crate::device::buffer::{Buffer, BufferDesc};
use crate::device::native::{NativeHandle, NativeObjectInfo, NativeObjectKind, NativeObjectRegistry};
use crate::device::sampler::{Sampler, SamplerDesc};
use crate::device::texture::{Texture, TextureDesc};
use crate::device::view::{
    BufferView, BufferViewDesc, BufferViewType, TextureView, TextureViewDesc, TextureViewType,
};
use crate::device::BindFlags;
use crate::error::Result;
use crate::shader::{Shader, ShaderDesc, ShaderResources};
use crate::engine_bail;

const SOURCE: &str = "stagebind::RenderDevice";

pub struct RenderDevice {
    config: Config,
    registry: NativeObjectRegistry,
}

impl RenderDevice {
    pub fn new(config: Config) -> Self {
        crate::engine_info!(SOURCE, "Render device created for '{}'", config.app_name);
        Self {
            config,
            registry: NativeObjectRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registry shared with native context implementations
    pub fn object_registry(&self) -> NativeObjectRegistry {
        self.registry.clone()
    }

    pub fn native_object(&self, handle: NativeHandle) -> Option<NativeObjectInfo> {
        self.registry.get(handle)
    }

    pub fn live_object_count(&self) -> usize {
        self.registry.len()
    }

    // ===== RESOURCES =====

    pub fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<Buffer>> {
        if desc.size == 0 {
            engine_bail!(SOURCE, "Buffer '{}' has zero size", desc.name);
        }
        if desc.bind_flags.is_empty() {
            engine_bail!(SOURCE, "Buffer '{}' has no bind flags", desc.name);
        }
        if desc.bind_flags.intersects(BindFlags::RENDER_TARGET | BindFlags::DEPTH_STENCIL) {
            engine_bail!(SOURCE, "Buffer '{}' cannot be bound as a render target or depth stencil", desc.name);
        }
        let native = self.registry.allocate(NativeObjectInfo {
            kind: NativeObjectKind::Buffer,
            name: desc.name.clone(),
            resource: None,
        })?;
        Ok(Arc::new(Buffer::new(desc, native)))
    }

    pub fn create_texture(&self, desc: TextureDesc) -> Result<Arc<Texture>> {
        if desc.width == 0 || desc.height == 0 || desc.array_size == 0 || desc.mip_levels == 0 {
            engine_bail!(
                SOURCE,
                "Texture '{}' has an empty extent ({}x{}, {} layers, {} mips)",
                desc.name, desc.width, desc.height, desc.array_size, desc.mip_levels
            );
        }
        if desc.bind_flags.intersects(BindFlags::VERTEX_BUFFER | BindFlags::INDEX_BUFFER | BindFlags::UNIFORM_BUFFER) {
            engine_bail!(SOURCE, "Texture '{}' has buffer-only bind flags {:?}", desc.name, desc.bind_flags);
        }
        let native = self.registry.allocate(NativeObjectInfo {
            kind: NativeObjectKind::Texture,
            name: desc.name.clone(),
            resource: None,
        })?;
        Ok(Arc::new(Texture::new(desc, native)))
    }

    pub fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<Sampler>> {
        let native = self.registry.allocate(NativeObjectInfo {
            kind: NativeObjectKind::Sampler,
            name: desc.name.clone(),
            resource: None,
        })?;
        Ok(Arc::new(Sampler::new(desc, native)))
    }

    // ===== VIEWS =====

    /// Create a view of `texture`; the texture must carry the matching bind flag
    pub fn create_texture_view(&self, texture: &Arc<Texture>, desc: TextureViewDesc) -> Result<Arc<TextureView>> {
        let (required, kind) = match desc.view_type {
            TextureViewType::ShaderResource => (BindFlags::SHADER_RESOURCE, NativeObjectKind::ShaderResourceView),
            TextureViewType::UnorderedAccess => (BindFlags::UNORDERED_ACCESS, NativeObjectKind::UnorderedAccessView),
            TextureViewType::RenderTarget => (BindFlags::RENDER_TARGET, NativeObjectKind::RenderTargetView),
            TextureViewType::DepthStencil => (BindFlags::DEPTH_STENCIL, NativeObjectKind::DepthStencilView),
        };
        if !texture.bind_flags().contains(required) {
            engine_bail!(
                SOURCE,
                "Cannot create {} '{}': texture '{}' was not created with {:?}",
                desc.view_type, desc.name, texture.name(), required
            );
        }
        if desc.sampler.is_some() && desc.view_type != TextureViewType::ShaderResource {
            engine_bail!(SOURCE, "Only shader resource views can carry a sampler ('{}')", desc.name);
        }
        let native = self.registry.allocate(NativeObjectInfo {
            kind,
            name: desc.name.clone(),
            resource: Some(texture.native_handle()),
        })?;
        Ok(Arc::new(TextureView::new(desc, texture.clone(), native)))
    }

    /// Create a view of `buffer`; the range must lie inside the buffer
    pub fn create_buffer_view(&self, buffer: &Arc<Buffer>, desc: BufferViewDesc) -> Result<Arc<BufferView>> {
        let (required, kind) = match desc.view_type {
            BufferViewType::ShaderResource => (BindFlags::SHADER_RESOURCE, NativeObjectKind::ShaderResourceView),
            BufferViewType::UnorderedAccess => (BindFlags::UNORDERED_ACCESS, NativeObjectKind::UnorderedAccessView),
        };
        if !buffer.bind_flags().contains(required) {
            engine_bail!(
                SOURCE,
                "Cannot create {} '{}': buffer '{}' was not created with {:?}",
                desc.view_type, desc.name, buffer.name(), required
            );
        }
        let size = if desc.size == 0 { buffer.size().saturating_sub(desc.offset) } else { desc.size };
        if size == 0 || desc.offset.saturating_add(size) > buffer.size() {
            engine_bail!(
                SOURCE,
                "View '{}' range {}+{} exceeds buffer '{}' of {} bytes",
                desc.name, desc.offset, size, buffer.name(), buffer.size()
            );
        }
        let native = self.registry.allocate(NativeObjectInfo {
            kind,
            name: desc.name.clone(),
            resource: Some(buffer.native_handle()),
        })?;
        let desc = BufferViewDesc { size, ..desc };
        Ok(Arc::new(BufferView::new(desc, buffer.clone(), native)))
    }

    // ===== SHADERS AND PIPELINES =====

    pub fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<Shader>> {
        let resources = ShaderResources::new(&desc)?;
        let native = self.registry.allocate(NativeObjectInfo {
            kind: NativeObjectKind::Shader,
            name: desc.name.clone(),
            resource: None,
        })?;
        crate::engine_debug!(
            SOURCE,
            "Shader '{}' ({}) created with {} resources",
            desc.name, desc.stage, resources.resources().len()
        );
        Ok(Arc::new(Shader::new(resources, native)))
    }

    /// Create a pipeline; statics can be bound on the returned value before
    /// it is shared behind an `Arc`
    pub fn create_pipeline(&self, desc: PipelineDesc) -> Result<Pipeline> {
        Pipeline::new(desc)
    }

    // ===== CONTEXTS =====

    pub fn create_immediate_context(&self, native: Box<dyn NativeContext>) -> DeviceContext {
        DeviceContext::new(ContextKind::Immediate, self.config.clone(), native)
    }

    pub fn create_deferred_context(&self, native: Box<dyn NativeContext>) -> DeviceContext {
        DeviceContext::new(ContextKind::Deferred, self.config.clone(), native)
    }
}

#[cfg(test)]
#[path = "render_device_tests.rs"]
mod tests;
