/// Native object handles and their registry
///
/// Every engine-level object owns one slot in the device's registry. The slot
/// key is the object's native handle: it is what the binding cache stores,
/// what the commit engine compares against its mirror and what the native
/// execution context receives. Keys are versioned, so a handle that outlives
/// its object can never compare equal to a newer object's handle.

use std::sync::{Arc, Mutex, Weak};
use slotmap::{new_key_type, SlotMap};
use crate::error::Result;
use crate::engine_err;

new_key_type! {
    /// Opaque handle identifying a native object
    pub struct NativeHandle;
}

/// What a native handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeObjectKind {
    Buffer,
    Texture,
    ShaderResourceView,
    UnorderedAccessView,
    RenderTargetView,
    DepthStencilView,
    Sampler,
    Shader,
}

impl NativeObjectKind {
    /// Buffers and textures own memory; everything else refers to them or is standalone
    pub fn is_resource(self) -> bool {
        matches!(self, NativeObjectKind::Buffer | NativeObjectKind::Texture)
    }
}

/// Registry record of a live native object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeObjectInfo {
    pub kind: NativeObjectKind,
    pub name: String,
    /// Underlying buffer or texture, for views
    pub resource: Option<NativeHandle>,
}

type RegistryMap = SlotMap<NativeHandle, NativeObjectInfo>;

/// Shared, cloneable view of a device's native object registry
///
/// Backends use it to resolve a view handle to its underlying resource.
#[derive(Clone, Default)]
pub struct NativeObjectRegistry {
    objects: Arc<Mutex<RegistryMap>>,
}

impl NativeObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live object
    pub fn get(&self, handle: NativeHandle) -> Option<NativeObjectInfo> {
        self.objects.lock().ok()?.get(handle).cloned()
    }

    /// Underlying resource of `handle`: itself for buffers/textures, the
    /// viewed resource for views, `None` for samplers and shaders
    pub fn resource_of(&self, handle: NativeHandle) -> Option<NativeHandle> {
        let info = self.get(handle)?;
        if info.kind.is_resource() {
            Some(handle)
        } else {
            info.resource
        }
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn allocate(&self, info: NativeObjectInfo) -> Result<NativeSlot> {
        let mut objects = self.objects.lock().map_err(|_| {
            engine_err!(@BackendError, "stagebind::RenderDevice", "Native object registry lock poisoned")
        })?;
        let handle = objects.insert(info);
        Ok(NativeSlot {
            handle,
            registry: Arc::downgrade(&self.objects),
        })
    }
}

/// Registry slot owned by an engine-level object; released on drop
#[derive(Debug)]
pub(crate) struct NativeSlot {
    handle: NativeHandle,
    registry: Weak<Mutex<RegistryMap>>,
}

impl NativeSlot {
    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }
}

impl Drop for NativeSlot {
    fn drop(&mut self) {
        if let Some(objects) = self.registry.upgrade() {
            if let Ok(mut objects) = objects.lock() {
                objects.remove(self.handle);
            }
        }
    }
}
