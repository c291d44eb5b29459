/// Per-stage resource cache
///
/// Four slot arrays (constant buffers, shader resource views, samplers,
/// unordered access views) sized once at initialization. Each slot holds a
/// strong reference to the bound object and, in a parallel array, the
/// object's native handle. The handle arrays are what the commit engine diffs
/// against the context mirror and passes to the native context as-is.
///
/// Setting a slot updates both arrays in the same call, so for every slot the
/// object and the handle are either both present or both absent.

use std::sync::Arc;
use crate::device::{Buffer, BufferView, DeviceObject, NativeHandle, Sampler, Texture, TextureView};
use crate::error::Result;
use crate::shader::{SlotCounts, SlotKind};
use crate::{engine_bail, engine_error};

const SOURCE: &str = "stagebind::ResourceCache";

// ===== CACHED RECORDS =====

/// Constant buffer slot
#[derive(Debug, Clone, Default)]
pub struct CachedConstantBuffer {
    buffer: Option<Arc<Buffer>>,
}

impl CachedConstantBuffer {
    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.buffer.is_none()
    }
}

/// View bound to a shader resource or unordered access slot
#[derive(Debug, Clone)]
pub enum CachedViewRef {
    Texture(Arc<TextureView>),
    Buffer(Arc<BufferView>),
}

impl CachedViewRef {
    pub fn name(&self) -> &str {
        match self {
            CachedViewRef::Texture(view) => view.name(),
            CachedViewRef::Buffer(view) => view.name(),
        }
    }

    pub fn native_handle(&self) -> NativeHandle {
        match self {
            CachedViewRef::Texture(view) => view.native_handle(),
            CachedViewRef::Buffer(view) => view.native_handle(),
        }
    }

    /// Native handle of the viewed texture or buffer
    pub fn resource_handle(&self) -> NativeHandle {
        match self {
            CachedViewRef::Texture(view) => view.texture().native_handle(),
            CachedViewRef::Buffer(view) => view.buffer().native_handle(),
        }
    }

    /// Name of the viewed texture or buffer
    pub fn resource_name(&self) -> &str {
        match self {
            CachedViewRef::Texture(view) => view.texture().name(),
            CachedViewRef::Buffer(view) => view.buffer().name(),
        }
    }

    pub fn is_texture(&self) -> bool {
        matches!(self, CachedViewRef::Texture(_))
    }

    pub fn to_object(&self) -> DeviceObject {
        match self {
            CachedViewRef::Texture(view) => DeviceObject::TextureView(view.clone()),
            CachedViewRef::Buffer(view) => DeviceObject::BufferView(view.clone()),
        }
    }
}

/// Shader resource or unordered access slot
#[derive(Debug, Clone, Default)]
pub struct CachedView {
    view: Option<CachedViewRef>,
}

impl CachedView {
    pub fn view(&self) -> Option<&CachedViewRef> {
        self.view.as_ref()
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        match &self.view {
            Some(CachedViewRef::Texture(view)) => Some(view.texture()),
            _ => None,
        }
    }

    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        match &self.view {
            Some(CachedViewRef::Buffer(view)) => Some(view.buffer()),
            _ => None,
        }
    }

    /// Underlying resource, used as the usage-state key
    pub fn resource_handle(&self) -> Option<NativeHandle> {
        self.view.as_ref().map(CachedViewRef::resource_handle)
    }

    pub fn is_null(&self) -> bool {
        self.view.is_none()
    }
}

/// Sampler slot
#[derive(Debug, Clone, Default)]
pub struct CachedSampler {
    sampler: Option<Arc<Sampler>>,
}

impl CachedSampler {
    pub fn sampler(&self) -> Option<&Arc<Sampler>> {
        self.sampler.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.sampler.is_none()
    }
}

// ===== RESOURCE CACHE =====

/// Slot storage of one shader stage
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    counts: Option<SlotCounts>,

    constant_buffers: Vec<CachedConstantBuffer>,
    cb_handles: Vec<Option<NativeHandle>>,

    shader_resources: Vec<CachedView>,
    srv_handles: Vec<Option<NativeHandle>>,

    samplers: Vec<CachedSampler>,
    sampler_handles: Vec<Option<NativeHandle>>,

    unordered_access: Vec<CachedView>,
    uav_handles: Vec<Option<NativeHandle>>,
}

impl ResourceCache {
    /// Uninitialized cache with no slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the slot arrays; every slot starts empty
    ///
    /// # Errors
    ///
    /// `UsageError` if the cache was already initialized, `InvalidResource`
    /// if a count exceeds its hardware limit. The cache is unchanged in both
    /// cases.
    pub fn initialize(&mut self, counts: SlotCounts) -> Result<()> {
        if let Some(existing) = self.counts {
            engine_bail!(
                @UsageError, SOURCE,
                "Resource cache is already initialized with {:?}; requested {:?}",
                existing, counts
            );
        }
        if let Some(kind) = counts.first_over_limit() {
            engine_bail!(
                SOURCE,
                "Requested {} {} slots, but only {} are available",
                counts.get(kind), kind, kind.max_slots()
            );
        }

        self.constant_buffers = vec![CachedConstantBuffer::default(); counts.constant_buffers as usize];
        self.cb_handles = vec![None; counts.constant_buffers as usize];
        self.shader_resources = vec![CachedView::default(); counts.shader_resources as usize];
        self.srv_handles = vec![None; counts.shader_resources as usize];
        self.samplers = vec![CachedSampler::default(); counts.samplers as usize];
        self.sampler_handles = vec![None; counts.samplers as usize];
        self.unordered_access = vec![CachedView::default(); counts.unordered_access as usize];
        self.uav_handles = vec![None; counts.unordered_access as usize];
        self.counts = Some(counts);
        Ok(())
    }

    /// Cache sized with `counts` right away
    pub fn with_counts(counts: SlotCounts) -> Result<Self> {
        let mut cache = Self::new();
        cache.initialize(counts)?;
        Ok(cache)
    }

    pub fn is_initialized(&self) -> bool {
        self.counts.is_some()
    }

    /// Slot counts; all zero while uninitialized
    pub fn counts(&self) -> SlotCounts {
        self.counts.unwrap_or_default()
    }

    pub fn count(&self, kind: SlotKind) -> u32 {
        self.counts().get(kind)
    }

    /// Native handles of every slot of `kind`, indexed by slot
    pub fn handles(&self, kind: SlotKind) -> &[Option<NativeHandle>] {
        match kind {
            SlotKind::ConstantBuffer => &self.cb_handles,
            SlotKind::ShaderResource => &self.srv_handles,
            SlotKind::Sampler => &self.sampler_handles,
            SlotKind::UnorderedAccess => &self.uav_handles,
        }
    }

    // ===== SETTERS =====

    /// Capacity check shared by every setter; violations never mutate the cache
    fn check_slot(&self, kind: SlotKind, slot: u32) -> bool {
        let count = self.count(kind);
        if slot < count {
            return true;
        }
        engine_error!(
            SOURCE,
            "Resource cache is not big enough: {} slot {} requested, {} available",
            kind, slot, count
        );
        debug_assert!(slot < count, "{} slot {} exceeds cache capacity {}", kind, slot, count);
        false
    }

    pub fn set_constant_buffer(&mut self, slot: u32, buffer: Option<Arc<Buffer>>) {
        if !self.check_slot(SlotKind::ConstantBuffer, slot) {
            return;
        }
        let slot = slot as usize;
        self.cb_handles[slot] = buffer.as_ref().map(|b| b.native_handle());
        self.constant_buffers[slot] = CachedConstantBuffer { buffer };
    }

    pub fn set_texture_srv(&mut self, slot: u32, view: Option<Arc<TextureView>>) {
        self.set_view(SlotKind::ShaderResource, slot, view.map(CachedViewRef::Texture));
    }

    pub fn set_buffer_srv(&mut self, slot: u32, view: Option<Arc<BufferView>>) {
        self.set_view(SlotKind::ShaderResource, slot, view.map(CachedViewRef::Buffer));
    }

    pub fn set_texture_uav(&mut self, slot: u32, view: Option<Arc<TextureView>>) {
        self.set_view(SlotKind::UnorderedAccess, slot, view.map(CachedViewRef::Texture));
    }

    pub fn set_buffer_uav(&mut self, slot: u32, view: Option<Arc<BufferView>>) {
        self.set_view(SlotKind::UnorderedAccess, slot, view.map(CachedViewRef::Buffer));
    }

    /// Set an SRV or UAV slot from an already-typed view reference
    pub fn set_view(&mut self, kind: SlotKind, slot: u32, view: Option<CachedViewRef>) {
        if matches!(kind, SlotKind::ConstantBuffer | SlotKind::Sampler) {
            engine_error!(SOURCE, "{} slots do not hold views", kind);
            return;
        }
        if !self.check_slot(kind, slot) {
            return;
        }
        let slot = slot as usize;
        let handle = view.as_ref().map(CachedViewRef::native_handle);
        if kind == SlotKind::ShaderResource {
            self.srv_handles[slot] = handle;
            self.shader_resources[slot] = CachedView { view };
        } else {
            self.uav_handles[slot] = handle;
            self.unordered_access[slot] = CachedView { view };
        }
    }

    pub fn set_sampler(&mut self, slot: u32, sampler: Option<Arc<Sampler>>) {
        if !self.check_slot(SlotKind::Sampler, slot) {
            return;
        }
        let slot = slot as usize;
        self.sampler_handles[slot] = sampler.as_ref().map(|s| s.native_handle());
        self.samplers[slot] = CachedSampler { sampler };
    }

    /// Clear one slot of any kind
    pub fn reset_slot(&mut self, kind: SlotKind, slot: u32) {
        match kind {
            SlotKind::ConstantBuffer => self.set_constant_buffer(slot, None),
            SlotKind::ShaderResource | SlotKind::UnorderedAccess => self.set_view(kind, slot, None),
            SlotKind::Sampler => self.set_sampler(slot, None),
        }
    }

    // ===== GETTERS =====

    pub fn constant_buffer(&self, slot: u32) -> Option<&CachedConstantBuffer> {
        self.constant_buffers.get(slot as usize)
    }

    pub fn shader_resource(&self, slot: u32) -> Option<&CachedView> {
        self.shader_resources.get(slot as usize)
    }

    pub fn sampler(&self, slot: u32) -> Option<&CachedSampler> {
        self.samplers.get(slot as usize)
    }

    pub fn unordered_access(&self, slot: u32) -> Option<&CachedView> {
        self.unordered_access.get(slot as usize)
    }

    pub fn is_bound(&self, kind: SlotKind, slot: u32) -> bool {
        matches!(self.handles(kind).get(slot as usize), Some(Some(_)))
    }

    /// SRV bound and of the expected texture/buffer flavor
    pub fn is_srv_bound(&self, slot: u32, is_texture: bool) -> bool {
        self.shader_resource(slot)
            .and_then(CachedView::view)
            .is_some_and(|view| view.is_texture() == is_texture)
    }

    /// UAV bound and of the expected texture/buffer flavor
    pub fn is_uav_bound(&self, slot: u32, is_texture: bool) -> bool {
        self.unordered_access(slot)
            .and_then(CachedView::view)
            .is_some_and(|view| view.is_texture() == is_texture)
    }

    /// Underlying resource bound at `slot`; `None` for samplers and empty slots
    pub fn resource_handle(&self, kind: SlotKind, slot: u32) -> Option<NativeHandle> {
        match kind {
            SlotKind::ConstantBuffer => self.cb_handles.get(slot as usize).copied().flatten(),
            SlotKind::ShaderResource => self.shader_resource(slot).and_then(CachedView::resource_handle),
            SlotKind::UnorderedAccess => self.unordered_access(slot).and_then(CachedView::resource_handle),
            SlotKind::Sampler => None,
        }
    }

    /// Object bound at `slot`, as handed to the native context
    pub fn object(&self, kind: SlotKind, slot: u32) -> Option<DeviceObject> {
        match kind {
            SlotKind::ConstantBuffer => self.constant_buffer(slot)?.buffer().map(DeviceObject::from),
            SlotKind::ShaderResource => self.shader_resource(slot)?.view().map(CachedViewRef::to_object),
            SlotKind::UnorderedAccess => self.unordered_access(slot)?.view().map(CachedViewRef::to_object),
            SlotKind::Sampler => self.sampler(slot)?.sampler().map(DeviceObject::from),
        }
    }

    /// Number of non-empty slots of `kind`
    pub fn bound_count(&self, kind: SlotKind) -> usize {
        self.handles(kind).iter().filter(|h| h.is_some()).count()
    }

    // ===== COPY =====

    /// Copy one slot (object and handle) from `src`
    pub fn copy_slot_from(&mut self, src: &ResourceCache, kind: SlotKind, slot: u32) {
        if slot >= src.count(kind) {
            engine_error!(SOURCE, "Source cache has no {} slot {}", kind, slot);
            return;
        }
        match kind {
            SlotKind::ConstantBuffer => {
                let buffer = src.constant_buffers[slot as usize].buffer.clone();
                self.set_constant_buffer(slot, buffer);
            }
            SlotKind::ShaderResource => {
                let view = src.shader_resources[slot as usize].view.clone();
                self.set_view(kind, slot, view);
            }
            SlotKind::UnorderedAccess => {
                let view = src.unordered_access[slot as usize].view.clone();
                self.set_view(kind, slot, view);
            }
            SlotKind::Sampler => {
                let sampler = src.samplers[slot as usize].sampler.clone();
                self.set_sampler(slot, sampler);
            }
        }
    }

    // ===== DIAGNOSTICS =====

    /// Check that every slot's handle matches its object
    ///
    /// Logs every inconsistent slot and returns false if any was found.
    pub fn verify_consistency(&self) -> bool {
        let mut consistent = true;
        let mut report = |kind: SlotKind, slot: usize, expected: Option<NativeHandle>, actual: Option<NativeHandle>| {
            if expected != actual {
                engine_error!(
                    SOURCE,
                    "Inconsistent {} slot {}: object handle {:?}, cached handle {:?}",
                    kind, slot, expected, actual
                );
                consistent = false;
            }
        };

        for (slot, (cb, handle)) in self.constant_buffers.iter().zip(&self.cb_handles).enumerate() {
            report(SlotKind::ConstantBuffer, slot, cb.buffer().map(|b| b.native_handle()), *handle);
        }
        for (slot, (srv, handle)) in self.shader_resources.iter().zip(&self.srv_handles).enumerate() {
            report(SlotKind::ShaderResource, slot, srv.view().map(CachedViewRef::native_handle), *handle);
        }
        for (slot, (sampler, handle)) in self.samplers.iter().zip(&self.sampler_handles).enumerate() {
            report(SlotKind::Sampler, slot, sampler.sampler().map(|s| s.native_handle()), *handle);
        }
        for (slot, (uav, handle)) in self.unordered_access.iter().zip(&self.uav_handles).enumerate() {
            report(SlotKind::UnorderedAccess, slot, uav.view().map(CachedViewRef::native_handle), *handle);
        }

        let counts = self.counts();
        let lengths_match = SlotKind::ALL
            .into_iter()
            .all(|kind| self.handles(kind).len() == counts.get(kind) as usize);
        if !lengths_match {
            engine_error!(SOURCE, "Slot arrays do not match the cache counts {:?}", counts);
        }
        consistent && lengths_match
    }
}

#[cfg(test)]
#[path = "resource_cache_tests.rs"]
mod tests;
