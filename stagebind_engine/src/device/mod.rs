/// Device module - engine-level objects and the device that creates them

pub mod native;
pub mod buffer;
pub mod texture;
pub mod sampler;
pub mod view;
pub mod object;
pub mod render_device;

use bitflags::bitflags;

pub use native::{NativeHandle, NativeObjectKind, NativeObjectInfo, NativeObjectRegistry};
pub use buffer::{Buffer, BufferDesc};
pub use texture::{Texture, TextureDesc};
pub use sampler::{Sampler, SamplerDesc, FilterType, AddressMode};
pub use view::{
    TextureView, TextureViewDesc, TextureViewType,
    BufferView, BufferViewDesc, BufferViewType,
};
pub use object::DeviceObject;
pub use render_device::RenderDevice;

bitflags! {
    /// Roles a buffer or texture is allowed to be bound in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const UNIFORM_BUFFER = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const RENDER_TARGET = 1 << 5;
        const DEPTH_STENCIL = 1 << 6;
    }
}
