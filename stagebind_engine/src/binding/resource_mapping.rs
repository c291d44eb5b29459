/// Resource mapping - name to device object dictionary
///
/// Used to bind many variables at once: every exposed variable whose name is
/// found in the mapping gets the mapped object(s).

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use crate::device::DeviceObject;

bitflags! {
    /// Controls how `bind_resources` treats variables and existing bindings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindShaderResourcesFlags: u32 {
        /// Bind static variables
        const UPDATE_STATIC = 1 << 0;
        /// Bind mutable variables
        const UPDATE_MUTABLE = 1 << 1;
        /// Bind dynamic variables
        const UPDATE_DYNAMIC = 1 << 2;
        /// Leave already-bound elements untouched
        const KEEP_EXISTING = 1 << 3;
        /// Report elements that stay unbound and have no entry in the mapping
        const VERIFY_ALL_RESOLVED = 1 << 4;

        const UPDATE_ALL = Self::UPDATE_STATIC.bits() | Self::UPDATE_MUTABLE.bits() | Self::UPDATE_DYNAMIC.bits();
    }
}

impl BindShaderResourcesFlags {
    /// Variable classes selected by the flags; none selected means all
    pub fn selected_classes(self) -> crate::shader::VariableClasses {
        use crate::shader::VariableClasses;
        let mut classes = VariableClasses::empty();
        if self.contains(Self::UPDATE_STATIC) {
            classes |= VariableClasses::STATIC;
        }
        if self.contains(Self::UPDATE_MUTABLE) {
            classes |= VariableClasses::MUTABLE;
        }
        if self.contains(Self::UPDATE_DYNAMIC) {
            classes |= VariableClasses::DYNAMIC;
        }
        if classes.is_empty() {
            VariableClasses::all()
        } else {
            classes
        }
    }
}

/// Named (array) device objects
#[derive(Debug, Clone, Default)]
pub struct ResourceMapping {
    entries: FxHashMap<String, Vec<Option<DeviceObject>>>,
}

impl ResourceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `name` (element 0) to `object`, replacing any previous entry
    pub fn set_resource(&mut self, name: &str, object: impl Into<DeviceObject>) {
        self.entries.insert(name.to_string(), vec![Some(object.into())]);
    }

    /// Builder form of [`Self::set_resource`]
    pub fn with_resource(mut self, name: &str, object: impl Into<DeviceObject>) -> Self {
        self.set_resource(name, object);
        self
    }

    /// Map elements `first..first + objects.len()` of `name`
    ///
    /// Existing elements outside the range are kept; gaps are left unmapped.
    pub fn set_resource_array(&mut self, name: &str, first: u32, objects: &[DeviceObject]) {
        let elements = self.entries.entry(name.to_string()).or_default();
        let end = first as usize + objects.len();
        if elements.len() < end {
            elements.resize(end, None);
        }
        for (element, object) in elements[first as usize..end].iter_mut().zip(objects) {
            *element = Some(object.clone());
        }
    }

    pub fn resource(&self, name: &str, array_index: u32) -> Option<&DeviceObject> {
        self.entries.get(name)?.get(array_index as usize)?.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove every element of `name`; returns whether it was mapped
    pub fn remove_resource(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Number of mapped names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "resource_mapping_tests.rs"]
mod tests;
