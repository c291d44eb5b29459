/// Shader variable - handle to one layout variable and the cache it binds into
///
/// Obtained from a pipeline (static variables) or a shader resource binding
/// (mutable and dynamic variables). The handle borrows both the layout and
/// the cache, so it is short-lived by construction.

use crate::binding::resource_cache::ResourceCache;
use crate::binding::resource_layout::{LayoutVariable, ResourceLayout};
use crate::device::DeviceObject;
use crate::shader::{ResourceKind, VariableClass};

pub struct ShaderVariable<'a> {
    layout: &'a ResourceLayout,
    variable: &'a LayoutVariable,
    cache: &'a mut ResourceCache,
    index: usize,
}

impl<'a> ShaderVariable<'a> {
    /// `None` if `index` is not an exposed index of `layout`
    pub(crate) fn new(layout: &'a ResourceLayout, cache: &'a mut ResourceCache, index: usize) -> Option<Self> {
        let variable = layout.variable(index)?;
        Some(Self { layout, variable, cache, index })
    }

    pub fn name(&self) -> &str {
        self.variable.name()
    }

    pub fn kind(&self) -> ResourceKind {
        self.variable.kind()
    }

    pub fn class(&self) -> VariableClass {
        self.variable.class()
    }

    pub fn array_size(&self) -> u32 {
        self.variable.array_size()
    }

    /// Exposed index within the owning layout
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bind `object` to element 0
    pub fn set(&mut self, object: impl Into<DeviceObject>) {
        let object = object.into();
        self.layout.bind_resource(self.index, 0, Some(&object), self.cache);
    }

    /// Bind `objects` to elements `first..first + objects.len()`
    pub fn set_array(&mut self, objects: &[DeviceObject], first: u32) {
        for (offset, object) in objects.iter().enumerate() {
            self.layout.bind_resource(self.index, first + offset as u32, Some(object), self.cache);
        }
    }

    /// Clear element `array_index`
    pub fn unbind(&mut self, array_index: u32) {
        self.layout.bind_resource(self.index, array_index, None, self.cache);
    }

    pub fn is_bound(&self, array_index: u32) -> bool {
        self.layout.is_bound(self.index, array_index, self.cache)
    }
}
