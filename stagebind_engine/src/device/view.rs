/// Texture and buffer views
///
/// Views are what shader slots actually reference. Each view keeps its
/// underlying resource alive and knows its role, which the resource layout
/// checks when a view is bound to a variable.

use std::fmt;
use std::sync::Arc;
use crate::device::buffer::Buffer;
use crate::device::native::{NativeHandle, NativeSlot};
use crate::device::sampler::Sampler;
use crate::device::texture::Texture;

// ===== TEXTURE VIEWS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewType {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

impl fmt::Display for TextureViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureViewType::ShaderResource => "TEXTURE_VIEW_SHADER_RESOURCE",
            TextureViewType::UnorderedAccess => "TEXTURE_VIEW_UNORDERED_ACCESS",
            TextureViewType::RenderTarget => "TEXTURE_VIEW_RENDER_TARGET",
            TextureViewType::DepthStencil => "TEXTURE_VIEW_DEPTH_STENCIL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct TextureViewDesc {
    pub name: String,
    pub view_type: TextureViewType,
    /// Sampler bound alongside the view when the shader uses combined texture samplers
    pub sampler: Option<Arc<Sampler>>,
}

impl TextureViewDesc {
    pub fn new(name: impl Into<String>, view_type: TextureViewType) -> Self {
        Self { name: name.into(), view_type, sampler: None }
    }

    pub fn with_sampler(mut self, sampler: Arc<Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }
}

#[derive(Debug)]
pub struct TextureView {
    desc: TextureViewDesc,
    texture: Arc<Texture>,
    native: NativeSlot,
}

impl TextureView {
    pub(crate) fn new(desc: TextureViewDesc, texture: Arc<Texture>, native: NativeSlot) -> Self {
        Self { desc, texture, native }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn view_type(&self) -> TextureViewType {
        self.desc.view_type
    }

    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn sampler(&self) -> Option<&Arc<Sampler>> {
        self.desc.sampler.as_ref()
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}

// ===== BUFFER VIEWS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferViewType {
    ShaderResource,
    UnorderedAccess,
}

impl fmt::Display for BufferViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferViewType::ShaderResource => "BUFFER_VIEW_SHADER_RESOURCE",
            BufferViewType::UnorderedAccess => "BUFFER_VIEW_UNORDERED_ACCESS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferViewDesc {
    pub name: String,
    pub view_type: BufferViewType,
    /// Byte offset of the first viewed element
    pub offset: u64,
    /// Viewed byte range; 0 means up to the end of the buffer
    pub size: u64,
}

impl BufferViewDesc {
    pub fn new(name: impl Into<String>, view_type: BufferViewType) -> Self {
        Self { name: name.into(), view_type, offset: 0, size: 0 }
    }
}

#[derive(Debug)]
pub struct BufferView {
    desc: BufferViewDesc,
    buffer: Arc<Buffer>,
    native: NativeSlot,
}

impl BufferView {
    pub(crate) fn new(desc: BufferViewDesc, buffer: Arc<Buffer>, native: NativeSlot) -> Self {
        Self { desc, buffer, native }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &BufferViewDesc {
        &self.desc
    }

    pub fn view_type(&self) -> BufferViewType {
        self.desc.view_type
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}
