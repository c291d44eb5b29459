/// Committed state - the context's mirror of what the native context holds
///
/// The commit engine diffs resource caches against this mirror and only
/// issues native calls for slots that differ. Each slot remembers the bound
/// handle and, for resource slots, the underlying resource, so a resource
/// can be found and unbound from every slot it occupies. Bound objects are
/// held by the mirror until they leave the native context.

use std::ops::RangeInclusive;
use std::sync::Arc;
use crate::context::native_context::IndexFormat;
use crate::device::{Buffer, DeviceObject, NativeHandle};
use crate::shader::{ShaderStage, SlotKind, MAX_RENDER_TARGETS, MAX_VERTEX_BUFFER_SLOTS};

/// Smallest and largest slot touched while scanning one slot array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinMaxSlot {
    range: Option<(u32, u32)>,
}

impl MinMaxSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, slot: u32) {
        self.range = Some(match self.range {
            None => (slot, slot),
            Some((min, max)) => (min.min(slot), max.max(slot)),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }

    pub fn range(&self) -> Option<RangeInclusive<u32>> {
        self.range.map(|(min, max)| min..=max)
    }
}

/// One committed slot array
#[derive(Debug, Clone, Default)]
pub struct CommittedSlots {
    handles: Vec<Option<NativeHandle>>,
    resources: Vec<Option<NativeHandle>>,
    objects: Vec<Option<DeviceObject>>,
    high_water: u32,
}

impl CommittedSlots {
    pub fn with_capacity(slots: u32) -> Self {
        Self {
            handles: vec![None; slots as usize],
            resources: vec![None; slots as usize],
            objects: vec![None; slots as usize],
            high_water: 0,
        }
    }

    pub fn handle(&self, slot: u32) -> Option<NativeHandle> {
        self.handles.get(slot as usize).copied().flatten()
    }

    pub fn resource(&self, slot: u32) -> Option<NativeHandle> {
        self.resources.get(slot as usize).copied().flatten()
    }

    /// Object the native context holds at `slot`
    pub fn object(&self, slot: u32) -> Option<&DeviceObject> {
        self.objects.get(slot as usize).and_then(Option::as_ref)
    }

    /// Highest non-empty slot + 1
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    pub fn handles(&self) -> &[Option<NativeHandle>] {
        &self.handles[..self.high_water as usize]
    }

    /// Record `object` at `slot`; `resource` is the buffer or texture behind it
    pub fn set(&mut self, slot: u32, object: Option<DeviceObject>, resource: Option<NativeHandle>) {
        let index = slot as usize;
        if index >= self.handles.len() {
            return;
        }
        let handle = object.as_ref().map(DeviceObject::native_handle);
        self.handles[index] = handle;
        self.resources[index] = if handle.is_some() { resource } else { None };
        self.objects[index] = object;
        if handle.is_some() {
            self.high_water = self.high_water.max(slot + 1);
        } else if slot + 1 == self.high_water {
            self.recompute_high_water();
        }
    }

    /// Slots currently holding `resource`
    pub fn slots_holding(&self, resource: NativeHandle) -> Vec<u32> {
        (0..self.high_water)
            .filter(|&slot| self.resources[slot as usize] == Some(resource))
            .collect()
    }

    pub fn holds(&self, resource: NativeHandle) -> bool {
        self.resources[..self.high_water as usize].contains(&Some(resource))
    }

    pub fn clear(&mut self) {
        self.handles.fill(None);
        self.resources.fill(None);
        self.objects.fill(None);
        self.high_water = 0;
    }

    fn recompute_high_water(&mut self) {
        self.high_water = self
            .handles
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last as u32 + 1);
    }
}

/// Vertex buffer slot as committed to the native context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommittedVertexBuffer {
    pub buffer: Option<NativeHandle>,
    pub stride: u32,
    pub offset: u64,
}

/// Index buffer as committed to the native context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedIndexBuffer {
    pub buffer: NativeHandle,
    pub format: IndexFormat,
    pub offset: u64,
}

/// Full mirror of one native context
#[derive(Debug, Clone)]
pub struct CommittedState {
    shaders: [Option<NativeHandle>; ShaderStage::COUNT],
    shader_slots: Vec<[CommittedSlots; SlotKind::COUNT]>,
    pub(crate) vertex_buffers: Vec<CommittedVertexBuffer>,
    vertex_buffer_objects: Vec<Option<Arc<Buffer>>>,
    pub(crate) index_buffer: Option<CommittedIndexBuffer>,
    index_buffer_object: Option<Arc<Buffer>>,
    pub(crate) render_targets: CommittedSlots,
    /// (view, texture) of the bound depth-stencil view
    pub(crate) depth_stencil: Option<(NativeHandle, NativeHandle)>,
}

impl Default for CommittedState {
    fn default() -> Self {
        Self::new()
    }
}

impl CommittedState {
    pub fn new() -> Self {
        let stage_slots = || SlotKind::ALL.map(|kind| CommittedSlots::with_capacity(kind.max_slots()));
        Self {
            shaders: [None; ShaderStage::COUNT],
            shader_slots: (0..ShaderStage::COUNT).map(|_| stage_slots()).collect(),
            vertex_buffers: vec![CommittedVertexBuffer::default(); MAX_VERTEX_BUFFER_SLOTS as usize],
            vertex_buffer_objects: vec![None; MAX_VERTEX_BUFFER_SLOTS as usize],
            index_buffer: None,
            index_buffer_object: None,
            render_targets: CommittedSlots::with_capacity(MAX_RENDER_TARGETS),
            depth_stencil: None,
        }
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<NativeHandle> {
        self.shaders[stage.index()]
    }

    pub fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>) {
        self.shaders[stage.index()] = shader;
    }

    pub fn slots(&self, stage: ShaderStage, kind: SlotKind) -> &CommittedSlots {
        &self.shader_slots[stage.index()][kind.index()]
    }

    pub fn slots_mut(&mut self, stage: ShaderStage, kind: SlotKind) -> &mut CommittedSlots {
        &mut self.shader_slots[stage.index()][kind.index()]
    }

    pub(crate) fn set_vertex_buffer(&mut self, slot: usize, binding: CommittedVertexBuffer, buffer: Option<Arc<Buffer>>) {
        self.vertex_buffers[slot] = binding;
        self.vertex_buffer_objects[slot] = buffer;
    }

    pub(crate) fn set_index_buffer(&mut self, binding: Option<CommittedIndexBuffer>, buffer: Option<Arc<Buffer>>) {
        self.index_buffer = binding;
        self.index_buffer_object = buffer;
    }

    pub fn vertex_buffer_object(&self, slot: u32) -> Option<&Arc<Buffer>> {
        self.vertex_buffer_objects.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn index_buffer_object(&self) -> Option<&Arc<Buffer>> {
        self.index_buffer_object.as_ref()
    }

    /// Highest non-empty vertex buffer slot + 1
    pub fn vertex_buffer_high_water(&self) -> u32 {
        self.vertex_buffers
            .iter()
            .rposition(|vb| vb.buffer.is_some())
            .map_or(0, |last| last as u32 + 1)
    }

    /// Drop every CB/SRV/sampler/UAV binding of every stage
    pub fn clear_shader_slots(&mut self) {
        for stage_slots in &mut self.shader_slots {
            for slots in stage_slots.iter_mut() {
                slots.clear();
            }
        }
    }

    /// Back to the unbound baseline
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
