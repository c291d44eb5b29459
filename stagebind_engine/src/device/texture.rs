/// Engine-level texture object

use crate::device::native::{NativeHandle, NativeSlot};
use crate::device::BindFlags;

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Number of array layers (1 for a plain 2D texture)
    pub array_size: u32,
    pub mip_levels: u32,
    pub bind_flags: BindFlags,
}

impl TextureDesc {
    /// Single-layer, single-mip 2D texture
    pub fn new_2d(name: impl Into<String>, width: u32, height: u32, bind_flags: BindFlags) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            array_size: 1,
            mip_levels: 1,
            bind_flags,
        }
    }
}

#[derive(Debug)]
pub struct Texture {
    desc: TextureDesc,
    native: NativeSlot,
}

impl Texture {
    pub(crate) fn new(desc: TextureDesc, native: NativeSlot) -> Self {
        Self { desc, native }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn bind_flags(&self) -> BindFlags {
        self.desc.bind_flags
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}
