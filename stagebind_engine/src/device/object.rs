/// Type-erased device object, the unit of binding
///
/// Shader variables and resource mappings accept any device object; the
/// resource layout checks at bind time that the object fits the variable.

use std::sync::Arc;
use crate::device::buffer::Buffer;
use crate::device::native::NativeHandle;
use crate::device::sampler::Sampler;
use crate::device::texture::Texture;
use crate::device::view::{BufferView, TextureView};

#[derive(Debug, Clone)]
pub enum DeviceObject {
    Buffer(Arc<Buffer>),
    Texture(Arc<Texture>),
    BufferView(Arc<BufferView>),
    TextureView(Arc<TextureView>),
    Sampler(Arc<Sampler>),
}

impl DeviceObject {
    pub fn name(&self) -> &str {
        match self {
            DeviceObject::Buffer(b) => b.name(),
            DeviceObject::Texture(t) => t.name(),
            DeviceObject::BufferView(v) => v.name(),
            DeviceObject::TextureView(v) => v.name(),
            DeviceObject::Sampler(s) => s.name(),
        }
    }

    /// Object type as used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            DeviceObject::Buffer(_) => "buffer",
            DeviceObject::Texture(_) => "texture",
            DeviceObject::BufferView(_) => "buffer view",
            DeviceObject::TextureView(_) => "texture view",
            DeviceObject::Sampler(_) => "sampler",
        }
    }

    pub fn native_handle(&self) -> NativeHandle {
        match self {
            DeviceObject::Buffer(b) => b.native_handle(),
            DeviceObject::Texture(t) => t.native_handle(),
            DeviceObject::BufferView(v) => v.native_handle(),
            DeviceObject::TextureView(v) => v.native_handle(),
            DeviceObject::Sampler(s) => s.native_handle(),
        }
    }

    /// Same underlying object (pointer identity)
    pub fn is_same(&self, other: &DeviceObject) -> bool {
        self.native_handle() == other.native_handle()
    }
}

impl From<Arc<Buffer>> for DeviceObject {
    fn from(buffer: Arc<Buffer>) -> Self {
        DeviceObject::Buffer(buffer)
    }
}

impl From<Arc<Texture>> for DeviceObject {
    fn from(texture: Arc<Texture>) -> Self {
        DeviceObject::Texture(texture)
    }
}

impl From<Arc<BufferView>> for DeviceObject {
    fn from(view: Arc<BufferView>) -> Self {
        DeviceObject::BufferView(view)
    }
}

impl From<Arc<TextureView>> for DeviceObject {
    fn from(view: Arc<TextureView>) -> Self {
        DeviceObject::TextureView(view)
    }
}

impl From<Arc<Sampler>> for DeviceObject {
    fn from(sampler: Arc<Sampler>) -> Self {
        DeviceObject::Sampler(sampler)
    }
}

impl From<&Arc<Buffer>> for DeviceObject {
    fn from(buffer: &Arc<Buffer>) -> Self {
        DeviceObject::Buffer(buffer.clone())
    }
}

impl From<&Arc<BufferView>> for DeviceObject {
    fn from(view: &Arc<BufferView>) -> Self {
        DeviceObject::BufferView(view.clone())
    }
}

impl From<&Arc<TextureView>> for DeviceObject {
    fn from(view: &Arc<TextureView>) -> Self {
        DeviceObject::TextureView(view.clone())
    }
}

impl From<&Arc<Sampler>> for DeviceObject {
    fn from(sampler: &Arc<Sampler>) -> Self {
        DeviceObject::Sampler(sampler.clone())
    }
}
