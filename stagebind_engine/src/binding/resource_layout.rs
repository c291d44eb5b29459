/// Resource layout - the variables of one shader stage bound against a cache
///
/// A layout keeps the subset of a shader's resources whose class is allowed
/// (static only for a pipeline, mutable + dynamic for a binding object) and
/// knows where every variable lives in a [`ResourceCache`]. Binding goes
/// through the layout, which type-checks the object before touching a slot.
///
/// Variables are stored grouped by kind: constant buffers, texture SRVs,
/// texture UAVs, buffer SRVs, buffer UAVs, samplers.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::binding::resource_cache::{CachedViewRef, ResourceCache};
use crate::binding::resource_mapping::{BindShaderResourcesFlags, ResourceMapping};
use crate::device::{BindFlags, Buffer, BufferViewType, DeviceObject, NativeHandle, Sampler, TextureViewType};
use crate::error::Result;
use crate::shader::{
    ResourceKind, ShaderResourceAttribs, ShaderResources, ShaderStage, SlotKind, VariableClass,
    VariableClasses,
};
use crate::{engine_bail, engine_error};

const SOURCE: &str = "stagebind::ResourceLayout";

/// Sampler slot range a texture SRV binds its view's sampler into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedSampler {
    pub name: String,
    pub bind_point: u32,
    pub bind_count: u32,
}

impl AssignedSampler {
    /// Sampler slot used by texture element `array_index`
    pub fn slot_for(&self, array_index: u32) -> u32 {
        if self.bind_count == 1 {
            self.bind_point
        } else {
            self.bind_point + array_index
        }
    }
}

/// One variable of a layout
#[derive(Debug, Clone)]
pub struct LayoutVariable {
    attribs: ShaderResourceAttribs,
    sampler: Option<AssignedSampler>,
}

impl LayoutVariable {
    pub fn name(&self) -> &str {
        &self.attribs.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.attribs.kind
    }

    pub fn class(&self) -> VariableClass {
        self.attribs.class
    }

    pub fn bind_point(&self) -> u32 {
        self.attribs.bind_point
    }

    pub fn array_size(&self) -> u32 {
        self.attribs.bind_count
    }

    pub fn attribs(&self) -> &ShaderResourceAttribs {
        &self.attribs
    }

    pub fn assigned_sampler(&self) -> Option<&AssignedSampler> {
        self.sampler.as_ref()
    }

    fn slot_kind(&self) -> SlotKind {
        self.attribs.kind.slot_kind()
    }
}

/// Object resolved for a slot after type checking
enum SlotValue {
    ConstantBuffer(Option<Arc<Buffer>>),
    View(Option<CachedViewRef>),
    Sampler(Option<Arc<Sampler>>),
}

impl SlotValue {
    fn native_handle(&self) -> Option<NativeHandle> {
        match self {
            SlotValue::ConstantBuffer(buffer) => buffer.as_ref().map(|b| b.native_handle()),
            SlotValue::View(view) => view.as_ref().map(CachedViewRef::native_handle),
            SlotValue::Sampler(sampler) => sampler.as_ref().map(|s| s.native_handle()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceLayout {
    resources: Arc<ShaderResources>,
    allowed: VariableClasses,
    variables: Vec<LayoutVariable>,
    /// Exposed variable index -> index in `variables`
    exposed: Vec<usize>,
    names: FxHashMap<String, usize>,
}

impl ResourceLayout {
    /// Build the layout of every resource whose class is in `allowed`
    ///
    /// An uninitialized `cache` is sized to hold exactly the kept variables
    /// (assigned sampler slots included). An initialized cache must already
    /// be large enough.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if an initialized cache is too small.
    pub fn new(resources: &Arc<ShaderResources>, allowed: VariableClasses, cache: &mut ResourceCache) -> Result<Self> {
        let required = resources.slot_counts(allowed);
        if !cache.is_initialized() {
            cache.initialize(required)?;
        } else {
            let available = cache.counts();
            for kind in SlotKind::ALL {
                if available.get(kind) < required.get(kind) {
                    engine_bail!(
                        SOURCE,
                        "Cache has {} {} slots, shader '{}' needs {}",
                        available.get(kind), kind, resources.shader_name(), required.get(kind)
                    );
                }
            }
        }

        let all = resources.resources();
        let combined = resources.is_using_combined_texture_samplers();

        // Samplers first, so textures can refer to them
        let assigned_samplers: Vec<Option<AssignedSampler>> = all
            .iter()
            .map(|res| {
                res.sampler_index.and_then(|i| all.get(i)).map(|sampler| AssignedSampler {
                    name: sampler.name.clone(),
                    bind_point: sampler.bind_point,
                    bind_count: sampler.bind_count,
                })
            })
            .collect();
        let combined_sampler_names: Vec<&str> = assigned_samplers
            .iter()
            .flatten()
            .map(|s| s.name.as_str())
            .collect();

        let mut variables = Vec::new();
        let mut exposed = Vec::new();
        let mut names = FxHashMap::default();
        for kind in ResourceKind::ALL {
            for index in resources.kind_range(kind) {
                let attribs = &all[index];
                if !allowed.contains_class(attribs.class) {
                    continue;
                }
                let variable_index = variables.len();
                variables.push(LayoutVariable {
                    attribs: attribs.clone(),
                    sampler: assigned_samplers[index].clone(),
                });
                let hidden = combined
                    && kind == ResourceKind::Sampler
                    && combined_sampler_names.contains(&attribs.name.as_str());
                if !hidden {
                    names.insert(attribs.name.clone(), exposed.len());
                    exposed.push(variable_index);
                }
            }
        }

        crate::engine_trace!(
            SOURCE,
            "Layout for shader '{}' ({}): {} variables, {} exposed",
            resources.shader_name(), resources.stage(), variables.len(), exposed.len()
        );

        Ok(Self {
            resources: resources.clone(),
            allowed,
            variables,
            exposed,
            names,
        })
    }

    pub fn shader_resources(&self) -> &Arc<ShaderResources> {
        &self.resources
    }

    pub fn stage(&self) -> ShaderStage {
        self.resources.stage()
    }

    pub fn allowed_classes(&self) -> VariableClasses {
        self.allowed
    }

    /// Number of variables reachable through the variable interface
    pub fn variable_count(&self) -> usize {
        self.exposed.len()
    }

    /// Exposed index of the variable called `name`
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn variable(&self, index: usize) -> Option<&LayoutVariable> {
        self.exposed.get(index).and_then(|&i| self.variables.get(i))
    }

    /// Every kept variable, hidden combined samplers included
    pub fn all_variables(&self) -> &[LayoutVariable] {
        &self.variables
    }

    // ===== BINDING =====

    /// Bind `object` (or unbind with `None`) to element `array_index` of
    /// exposed variable `index`
    ///
    /// A type mismatch is logged and leaves the cache unchanged.
    pub fn bind_resource(&self, index: usize, array_index: u32, object: Option<&DeviceObject>, cache: &mut ResourceCache) {
        let Some(variable) = self.variable(index) else {
            engine_error!(
                SOURCE,
                "Variable index {} is out of range: shader '{}' exposes {} variables",
                index, self.resources.shader_name(), self.exposed.len()
            );
            return;
        };
        if array_index >= variable.array_size() {
            engine_error!(
                SOURCE,
                "Array index {} is out of range for variable '{}' of size {}",
                array_index, variable.name(), variable.array_size()
            );
            return;
        }
        let Some(value) = self.resolve(variable, array_index, object) else {
            return;
        };

        let slot = variable.bind_point() + array_index;
        let kind = variable.slot_kind();
        self.check_rebind(variable, array_index, kind, slot, value.native_handle(), cache);

        let sampler_from_view = match (&value, variable.assigned_sampler()) {
            (SlotValue::View(view), Some(assigned)) => Some((assigned, Self::view_sampler(variable, view))),
            _ => None,
        };

        match value {
            SlotValue::ConstantBuffer(buffer) => cache.set_constant_buffer(slot, buffer),
            SlotValue::View(view) => cache.set_view(kind, slot, view),
            SlotValue::Sampler(sampler) => cache.set_sampler(slot, sampler),
        }

        if let Some((assigned, sampler)) = sampler_from_view {
            cache.set_sampler(assigned.slot_for(array_index), sampler);
        }
    }

    /// Whether element `array_index` of exposed variable `index` holds an
    /// object of the right flavor
    pub fn is_bound(&self, index: usize, array_index: u32, cache: &ResourceCache) -> bool {
        self.variable(index)
            .is_some_and(|variable| array_index < variable.array_size() && Self::element_bound(variable, array_index, cache))
    }

    /// Bind every exposed variable found in `mapping`
    pub fn bind_resources(&self, mapping: &ResourceMapping, flags: BindShaderResourcesFlags, cache: &mut ResourceCache) {
        let classes = flags.selected_classes();
        for index in 0..self.exposed.len() {
            let variable = &self.variables[self.exposed[index]];
            if !classes.contains_class(variable.class()) {
                continue;
            }
            for array_index in 0..variable.array_size() {
                let bound = Self::element_bound(variable, array_index, cache);
                if bound && flags.contains(BindShaderResourcesFlags::KEEP_EXISTING) {
                    continue;
                }
                match mapping.resource(variable.name(), array_index) {
                    Some(object) => self.bind_resource(index, array_index, Some(object), cache),
                    None => {
                        if !bound && flags.contains(BindShaderResourcesFlags::VERIFY_ALL_RESOLVED) {
                            engine_error!(
                                SOURCE,
                                "Cannot bind resource to {} variable '{}': no '{}[{}]' in the resource mapping",
                                variable.class(), variable.name(), variable.name(), array_index
                            );
                        }
                    }
                }
            }
        }
    }

    /// Copy every slot covered by this layout from `src` into `dst`
    ///
    /// Slots of `dst` outside the layout's ranges are not touched. Assigned
    /// samplers share their texture's class, so their slots are covered by
    /// the sampler variables.
    pub fn copy_resources(&self, src: &ResourceCache, dst: &mut ResourceCache) {
        for variable in &self.variables {
            for slot in variable.attribs.slot_range() {
                dst.copy_slot_from(src, variable.slot_kind(), slot);
            }
        }
    }

    /// Log every unbound element; true when all are bound
    pub fn verify_bindings(&self, cache: &ResourceCache) -> bool {
        let mut all_bound = true;
        for variable in &self.variables {
            for array_index in 0..variable.array_size() {
                if Self::element_bound(variable, array_index, cache) {
                    continue;
                }
                all_bound = false;
                let element = if variable.array_size() > 1 {
                    format!("{}[{}]", variable.name(), array_index)
                } else {
                    variable.name().to_string()
                };
                engine_error!(
                    SOURCE,
                    "No resource is bound to {} variable '{}' in shader '{}'",
                    variable.class(), element, self.resources.shader_name()
                );
            }
        }
        all_bound
    }

    // ===== INTERNALS =====

    fn element_bound(variable: &LayoutVariable, array_index: u32, cache: &ResourceCache) -> bool {
        let slot = variable.bind_point() + array_index;
        match variable.kind() {
            ResourceKind::ConstantBuffer => cache.is_bound(SlotKind::ConstantBuffer, slot),
            ResourceKind::TextureSrv => cache.is_srv_bound(slot, true),
            ResourceKind::BufferSrv => cache.is_srv_bound(slot, false),
            ResourceKind::TextureUav => cache.is_uav_bound(slot, true),
            ResourceKind::BufferUav => cache.is_uav_bound(slot, false),
            ResourceKind::Sampler => cache.is_bound(SlotKind::Sampler, slot),
        }
    }

    /// Type-check `object` against the variable; `None` means rejected
    fn resolve(&self, variable: &LayoutVariable, array_index: u32, object: Option<&DeviceObject>) -> Option<SlotValue> {
        let Some(object) = object else {
            return Some(match variable.kind() {
                ResourceKind::ConstantBuffer => SlotValue::ConstantBuffer(None),
                ResourceKind::Sampler => SlotValue::Sampler(None),
                _ => SlotValue::View(None),
            });
        };

        let value = match (variable.kind(), object) {
            (ResourceKind::ConstantBuffer, DeviceObject::Buffer(buffer)) => {
                if !buffer.bind_flags().contains(BindFlags::UNIFORM_BUFFER) {
                    engine_error!(
                        SOURCE,
                        "Buffer '{}' bound to constant buffer '{}' was not created with the uniform buffer bind flag",
                        buffer.name(), variable.name()
                    );
                    return None;
                }
                SlotValue::ConstantBuffer(Some(buffer.clone()))
            }
            (ResourceKind::TextureSrv | ResourceKind::TextureUav, DeviceObject::TextureView(view)) => {
                let expected = if variable.kind() == ResourceKind::TextureSrv {
                    TextureViewType::ShaderResource
                } else {
                    TextureViewType::UnorderedAccess
                };
                if view.view_type() != expected {
                    self.report_view_type(variable, array_index, object, &expected, &view.view_type());
                    return None;
                }
                SlotValue::View(Some(CachedViewRef::Texture(view.clone())))
            }
            (ResourceKind::BufferSrv | ResourceKind::BufferUav, DeviceObject::BufferView(view)) => {
                let expected = if variable.kind() == ResourceKind::BufferSrv {
                    BufferViewType::ShaderResource
                } else {
                    BufferViewType::UnorderedAccess
                };
                if view.view_type() != expected {
                    self.report_view_type(variable, array_index, object, &expected, &view.view_type());
                    return None;
                }
                SlotValue::View(Some(CachedViewRef::Buffer(view.clone())))
            }
            (ResourceKind::Sampler, DeviceObject::Sampler(sampler)) => SlotValue::Sampler(Some(sampler.clone())),
            _ => {
                engine_error!(
                    SOURCE,
                    "Failed to bind {} '{}' to variable '{}[{}]' in shader '{}': Incorrect resource type, {} expected",
                    object.type_name(), object.name(), variable.name(), array_index,
                    self.resources.shader_name(), variable.kind()
                );
                return None;
            }
        };
        Some(value)
    }

    fn report_view_type(
        &self,
        variable: &LayoutVariable,
        array_index: u32,
        object: &DeviceObject,
        expected: &dyn std::fmt::Display,
        actual: &dyn std::fmt::Display,
    ) {
        engine_error!(
            SOURCE,
            "Failed to bind view '{}' to variable '{}[{}]' in shader '{}': Incorrect view type, {} expected, {} provided",
            object.name(), variable.name(), array_index, self.resources.shader_name(), expected, actual
        );
    }

    /// Non-dynamic slots are bound once; a different value is reported and then overwrites
    fn check_rebind(
        &self,
        variable: &LayoutVariable,
        array_index: u32,
        kind: SlotKind,
        slot: u32,
        new_handle: Option<NativeHandle>,
        cache: &ResourceCache,
    ) {
        if variable.class() == VariableClass::Dynamic {
            return;
        }
        let current = cache.handles(kind).get(slot as usize).copied().flatten();
        if current.is_some() && current != new_handle {
            engine_error!(
                SOURCE,
                "Non-null resource is already bound to {} variable '{}[{}]' in shader '{}'; \
                 use a dynamic variable to rebind resources at run time",
                variable.class(), variable.name(), array_index, self.resources.shader_name()
            );
        }
    }

    fn view_sampler(variable: &LayoutVariable, view: &Option<CachedViewRef>) -> Option<Arc<Sampler>> {
        match view {
            Some(CachedViewRef::Texture(texture_view)) => {
                let sampler = texture_view.sampler().cloned();
                if sampler.is_none() {
                    engine_error!(
                        SOURCE,
                        "Texture view '{}' bound to '{}' has no sampler for combined sampler '{}'",
                        texture_view.name(),
                        variable.name(),
                        variable.assigned_sampler().map_or("", |s| s.name.as_str())
                    );
                }
                sampler
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "resource_layout_tests.rs"]
mod tests;
