/// Engine-level buffer object

use crate::device::native::{NativeHandle, NativeSlot};
use crate::device::BindFlags;

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Roles the buffer may be bound in
    pub bind_flags: BindFlags,
}

impl BufferDesc {
    pub fn new(name: impl Into<String>, size: u64, bind_flags: BindFlags) -> Self {
        Self { name: name.into(), size, bind_flags }
    }
}

/// GPU buffer as seen by the binding engine
///
/// Created by [`crate::stagebind::RenderDevice::create_buffer`]. The buffer's
/// native handle doubles as its resource id in usage-state tracking.
#[derive(Debug)]
pub struct Buffer {
    desc: BufferDesc,
    native: NativeSlot,
}

impl Buffer {
    pub(crate) fn new(desc: BufferDesc, native: NativeSlot) -> Self {
        Self { desc, native }
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }

    pub fn bind_flags(&self) -> BindFlags {
        self.desc.bind_flags
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}
