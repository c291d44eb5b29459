/// Device context - commit engine of one execution context
///
/// The context owns the mirror of the native bindings, the per-context usage
/// state tracker and the currently set pipeline, vertex/index streams and
/// render targets. Committing a shader resource binding runs two passes per
/// stage and slot kind (constant buffers, shader resources, samplers,
/// unordered access):
///
/// - transition: every bound resource that lacks the slot's role is first
///   unbound from every conflicting role, then gains the role;
/// - commit: the cache's native handles are diffed against the mirror and a
///   single set-range call covers the smallest changed slot range.

use std::sync::Arc;
use crate::binding::pipeline::Pipeline;
use crate::binding::resource_cache::{CachedViewRef, ResourceCache};
use crate::binding::shader_resource_binding::ShaderResourceBinding;
use crate::binding::usage_state::{ResourceState, UsageStateTracker};
use crate::config::Config;
use crate::context::command_list::{CommandList, RetainedObjects};
use crate::context::committed_state::{
    CommittedIndexBuffer, CommittedState, CommittedVertexBuffer, MinMaxSlot,
};
use crate::context::native_context::{
    DispatchAttribs, DrawAttribs, DrawIndexedAttribs, IndexFormat, NativeContext,
};
use crate::device::{BindFlags, Buffer, DeviceObject, NativeHandle, TextureView, TextureViewType};
use crate::error::Result;
use crate::shader::{ShaderStage, SlotKind, MAX_RENDER_TARGETS, MAX_VERTEX_BUFFER_SLOTS};
use crate::{engine_bail, engine_debug, engine_error, engine_trace, engine_warn};

const SOURCE: &str = "stagebind::DeviceContext";

// ===== PUBLIC TYPES =====

/// Immediate contexts execute; deferred contexts record command lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Immediate,
    Deferred,
}

/// How `commit_shader_resources` treats resource usage states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceStateTransitionMode {
    /// Commit only
    #[default]
    None,
    /// Transition every bound resource, then commit
    Transition,
    /// Report resources not in their required state, then commit
    Verify,
}

/// Counters of the work a context has issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub commits: u64,
    /// Set-range calls for shader slots, vertex buffers and the index buffer
    pub set_range_calls: u64,
    pub slots_committed: u64,
    /// Single-slot unbind calls issued to resolve hazards
    pub unbind_calls: u64,
    /// Roles established on resources
    pub transitions: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub command_lists: u64,
}

/// Explicit usage state change requested by the application
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// Buffer, texture or a view of one
    pub resource: DeviceObject,
    pub new_state: ResourceState,
}

impl StateTransition {
    pub fn new(resource: impl Into<DeviceObject>, new_state: ResourceState) -> Self {
        Self { resource: resource.into(), new_state }
    }
}

/// First slot where the mirror and the native context disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingMismatch {
    pub stage: ShaderStage,
    pub kind: SlotKind,
    pub slot: u32,
    /// Handle in the mirror
    pub expected: Option<NativeHandle>,
    /// Handle in the native context
    pub actual: Option<NativeHandle>,
}

/// Vertex buffer stream
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub buffer: Arc<Buffer>,
    pub stride: u32,
    pub offset: u64,
}

impl VertexStream {
    pub fn new(buffer: Arc<Buffer>, stride: u32) -> Self {
        Self { buffer, stride, offset: 0 }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone)]
struct IndexStream {
    buffer: Arc<Buffer>,
    format: IndexFormat,
    offset: u64,
}

/// Usage role a shader slot kind puts its resources in; samplers have none
fn slot_role(kind: SlotKind) -> Option<ResourceState> {
    match kind {
        SlotKind::ConstantBuffer => Some(ResourceState::CONSTANT_BUFFER),
        SlotKind::ShaderResource => Some(ResourceState::SHADER_RESOURCE),
        SlotKind::UnorderedAccess => Some(ResourceState::UNORDERED_ACCESS),
        SlotKind::Sampler => None,
    }
}

/// Name of the buffer or texture bound at `slot`, for diagnostics
fn cached_resource_name(cache: &ResourceCache, kind: SlotKind, slot: u32) -> String {
    let name = match kind {
        SlotKind::ConstantBuffer => cache.constant_buffer(slot).and_then(|cb| cb.buffer()).map(|b| b.name()),
        SlotKind::ShaderResource => cache.shader_resource(slot).and_then(|v| v.view()).map(CachedViewRef::resource_name),
        SlotKind::UnorderedAccess => cache.unordered_access(slot).and_then(|v| v.view()).map(CachedViewRef::resource_name),
        SlotKind::Sampler => cache.sampler(slot).and_then(|s| s.sampler()).map(|s| s.name()),
    };
    name.unwrap_or("<null>").to_string()
}

// ===== DEVICE CONTEXT =====

pub struct DeviceContext {
    kind: ContextKind,
    config: Config,
    native: Box<dyn NativeContext>,
    committed: CommittedState,
    tracker: UsageStateTracker,
    pipeline: Option<Arc<Pipeline>>,
    vertex_streams: Vec<Option<VertexStream>>,
    index_stream: Option<IndexStream>,
    render_targets: Vec<Option<Arc<TextureView>>>,
    depth_stencil: Option<Arc<TextureView>>,
    /// Objects referenced by the calls of the current recording (deferred only)
    retained: RetainedObjects,
    stats: ContextStats,
}

impl DeviceContext {
    pub(crate) fn new(kind: ContextKind, config: Config, native: Box<dyn NativeContext>) -> Self {
        engine_debug!(SOURCE, "{:?} device context created", kind);
        Self {
            kind,
            config,
            native,
            committed: CommittedState::new(),
            tracker: UsageStateTracker::new(),
            pipeline: None,
            vertex_streams: vec![None; MAX_VERTEX_BUFFER_SLOTS as usize],
            index_stream: None,
            render_targets: Vec::new(),
            depth_stencil: None,
            retained: RetainedObjects::default(),
            stats: ContextStats::default(),
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.pipeline.as_ref()
    }

    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    pub fn native(&self) -> &dyn NativeContext {
        self.native.as_ref()
    }

    pub fn committed_state(&self) -> &CommittedState {
        &self.committed
    }

    pub fn usage_tracker(&self) -> &UsageStateTracker {
        &self.tracker
    }

    /// Usage state of a buffer or texture (views resolve to their resource)
    pub fn resource_state(&self, object: &DeviceObject) -> ResourceState {
        match Self::resource_of(object) {
            Some(resource) => self.tracker.state(resource),
            None => ResourceState::UNDEFINED,
        }
    }

    fn resource_of(object: &DeviceObject) -> Option<NativeHandle> {
        match object {
            DeviceObject::Buffer(buffer) => Some(buffer.native_handle()),
            DeviceObject::Texture(texture) => Some(texture.native_handle()),
            DeviceObject::BufferView(view) => Some(view.buffer().native_handle()),
            DeviceObject::TextureView(view) => Some(view.texture().native_handle()),
            DeviceObject::Sampler(_) => None,
        }
    }

    // ===== PIPELINE =====

    /// Bind the pipeline's shaders; stages the pipeline does not use are
    /// disabled
    pub fn set_pipeline_state(&mut self, pipeline: &Arc<Pipeline>) {
        for stage in ShaderStage::ALL {
            let shader = pipeline.shader(stage).map(|s| s.native_handle());
            if self.committed.shader(stage) != shader {
                self.native.set_shader(stage, shader);
                self.committed.set_shader(stage, shader);
            }
        }
        engine_trace!(SOURCE, "Pipeline '{}' set", pipeline.name());
        if self.kind == ContextKind::Deferred {
            self.retained.retain_pipeline(pipeline);
        }
        self.pipeline = Some(pipeline.clone());
    }

    // ===== SHADER RESOURCES =====

    /// Commit the resources of `srb` for the current pipeline
    ///
    /// Without a pipeline, or with a binding from an incompatible pipeline,
    /// the call is reported and does nothing.
    pub fn commit_shader_resources(&mut self, srb: &ShaderResourceBinding, mode: ResourceStateTransitionMode) {
        let Some(pipeline) = self.pipeline.clone() else {
            engine_error!(SOURCE, "No pipeline state is bound; cannot commit shader resources");
            return;
        };
        if !pipeline.is_compatible_with(srb.pipeline()) {
            engine_error!(
                SOURCE,
                "Shader resource binding of pipeline '{}' is not compatible with the bound pipeline '{}'",
                srb.pipeline().name(), pipeline.name()
            );
            return;
        }

        if self.config.verify_shader_bindings {
            if !srb.static_resources_bound() {
                engine_warn!(
                    SOURCE,
                    "Static resources have not been bound to the shader resource binding of pipeline '{}'",
                    pipeline.name()
                );
            }
            if !srb.verify_bindings() {
                engine_warn!(SOURCE, "Committing shader resources of pipeline '{}' with unbound variables", pipeline.name());
            }
        }

        match mode {
            ResourceStateTransitionMode::Transition => self.transition_caches(srb),
            ResourceStateTransitionMode::Verify => {
                if self.config.verify_resource_states {
                    self.verify_cache_states(srb);
                }
            }
            ResourceStateTransitionMode::None => {}
        }

        for (stage, cache) in srb.stage_caches() {
            for kind in SlotKind::ALL {
                self.commit_slot_kind(stage, kind, cache);
            }
        }
        self.stats.commits += 1;

        if self.config.verify_context_bindings {
            self.verify_committed_bindings();
        }
    }

    /// Transition pass only: bring every resource of `srb` into its role
    pub fn transition_shader_resources(&mut self, pipeline: &Pipeline, srb: &ShaderResourceBinding) {
        if !pipeline.is_compatible_with(srb.pipeline()) {
            engine_error!(
                SOURCE,
                "Shader resource binding of pipeline '{}' is not compatible with pipeline '{}'",
                srb.pipeline().name(), pipeline.name()
            );
            return;
        }
        self.transition_caches(srb);
    }

    fn transition_caches(&mut self, srb: &ShaderResourceBinding) {
        for (_, cache) in srb.stage_caches() {
            for kind in SlotKind::ALL {
                let Some(role) = slot_role(kind) else {
                    continue;
                };
                for slot in 0..cache.count(kind) {
                    if let Some(resource) = cache.resource_handle(kind, slot) {
                        self.transition_resource(resource, role);
                    }
                }
            }
        }
    }

    fn verify_cache_states(&self, srb: &ShaderResourceBinding) {
        for (stage, cache) in srb.stage_caches() {
            for kind in SlotKind::ALL {
                let Some(role) = slot_role(kind) else {
                    continue;
                };
                for slot in 0..cache.count(kind) {
                    let Some(resource) = cache.resource_handle(kind, slot) else {
                        continue;
                    };
                    if !self.tracker.check_state(resource, role) {
                        engine_error!(
                            SOURCE,
                            "Resource '{}' bound to {} {} slot {} is not in {:?} state (current: {:?}); \
                             transition it or commit with ResourceStateTransitionMode::Transition",
                            cached_resource_name(cache, kind, slot), stage, kind, slot, role,
                            self.tracker.state(resource)
                        );
                    }
                }
            }
        }
    }

    /// Diff one slot array against the mirror and issue one set-range call
    fn commit_slot_kind(&mut self, stage: ShaderStage, kind: SlotKind, cache: &ResourceCache) {
        let desired = cache.handles(kind);
        let count = desired.len() as u32;
        // Slots past the cache count are desired empty
        let end = count.max(self.committed.slots(stage, kind).high_water());
        let role = slot_role(kind);

        let mut changed = MinMaxSlot::new();
        let mut replaced = Vec::new();
        for slot in 0..end {
            let wanted = desired.get(slot as usize).copied().flatten();
            let committed = self.committed.slots(stage, kind);
            if committed.handle(slot) == wanted {
                continue;
            }
            if let Some(previous) = committed.resource(slot) {
                replaced.push(previous);
            }
            let resource = if slot < count { cache.resource_handle(kind, slot) } else { None };
            if let (Some(resource), Some(role)) = (resource, role) {
                self.transition_resource(resource, role);
            }
            let object = if slot < count { cache.object(kind, slot) } else { None };
            self.committed.slots_mut(stage, kind).set(slot, object, resource);
            changed.add(slot);
        }

        if let Some(range) = changed.range() {
            let slots = self.committed.slots(stage, kind);
            let handles: Vec<Option<NativeHandle>> = range.clone().map(|slot| slots.handle(slot)).collect();
            self.native.set_shader_slots(stage, kind, *range.start(), &handles);
            if self.kind == ContextKind::Deferred {
                for slot in range.clone() {
                    if let Some(object) = slots.object(slot) {
                        self.retained.retain(object.clone());
                    }
                }
            }
            self.stats.set_range_calls += 1;
            self.stats.slots_committed += handles.len() as u64;
            engine_trace!(SOURCE, "Committed {} {} slots {}..={}", stage, kind, range.start(), range.end());
        }

        if let Some(role) = role {
            for resource in replaced {
                self.release_role_if_unbound(resource, role);
            }
        }
    }

    /// Drop every committed CB/SRV/sampler/UAV binding
    ///
    /// Objects held only by the mirror are released. Vertex and index
    /// buffers stay bound.
    pub fn release_committed_shader_resources(&mut self) {
        for stage in ShaderStage::ALL {
            for kind in SlotKind::ALL {
                let high_water = self.committed.slots(stage, kind).high_water();
                if high_water == 0 {
                    continue;
                }
                self.native.set_shader_slots(stage, kind, 0, &vec![None; high_water as usize]);
                self.committed.slots_mut(stage, kind).clear();
                self.stats.set_range_calls += 1;
            }
        }
        self.tracker.clear_roles_everywhere(ResourceState::SHADER_SLOT_ROLES);
    }

    // ===== USAGE STATES =====

    /// Transition resources ahead of a batch of draws
    pub fn transition_resource_states(&mut self, transitions: &[StateTransition]) {
        for transition in transitions {
            let Some(resource) = Self::resource_of(&transition.resource) else {
                engine_error!(SOURCE, "Sampler '{}' has no usage state", transition.resource.name());
                continue;
            };
            let roles = transition.new_state;
            if roles.is_empty() || roles.contains(ResourceState::UNDEFINED) || roles.intersects(roles.conflicting_roles()) {
                engine_error!(
                    SOURCE,
                    "Invalid state {:?} requested for '{}'",
                    roles, transition.resource.name()
                );
                continue;
            }
            self.transition_resource(resource, roles);
        }
    }

    /// Establish `roles`, unbinding the resource from every conflicting role first
    fn transition_resource(&mut self, resource: NativeHandle, roles: ResourceState) {
        let state = self.tracker.state(resource);
        if state.is_known() && state.contains(roles) {
            return;
        }
        let conflicts = state & roles.conflicting_roles();
        if !conflicts.is_empty() {
            self.unbind_resource_roles(resource, conflicts);
        }
        self.tracker.establish(resource, roles);
        self.stats.transitions += 1;
    }

    fn unbind_resource_roles(&mut self, resource: NativeHandle, roles: ResourceState) {
        if roles.contains(ResourceState::UNORDERED_ACCESS) {
            self.unbind_resource_from_uav(resource);
        }
        if roles.contains(ResourceState::SHADER_RESOURCE) {
            self.unbind_from_shader_slots(resource, SlotKind::ShaderResource);
        }
        if roles.contains(ResourceState::CONSTANT_BUFFER) {
            self.unbind_from_shader_slots(resource, SlotKind::ConstantBuffer);
        }
        if roles.contains(ResourceState::VERTEX_BUFFER) {
            self.unbind_from_vertex_buffers(resource);
        }
        if roles.contains(ResourceState::INDEX_BUFFER) {
            self.unbind_from_index_buffer(resource);
        }
        if roles.intersects(ResourceState::RENDER_TARGET | ResourceState::DEPTH_STENCIL) {
            self.unbind_from_render_targets(resource, roles);
        }
        self.tracker.clear_state(resource, roles);
    }

    /// Unbind `resource` from every UAV slot of every stage
    pub fn unbind_resource_from_uav(&mut self, resource: NativeHandle) {
        self.unbind_from_shader_slots(resource, SlotKind::UnorderedAccess);
        self.tracker.clear_state(resource, ResourceState::UNORDERED_ACCESS);
    }

    /// Unbind a buffer from every input role: SRV, constant buffer, vertex and index buffer
    pub fn unbind_buffer_from_input(&mut self, buffer: NativeHandle) {
        self.unbind_from_shader_slots(buffer, SlotKind::ShaderResource);
        self.unbind_from_shader_slots(buffer, SlotKind::ConstantBuffer);
        self.unbind_from_vertex_buffers(buffer);
        self.unbind_from_index_buffer(buffer);
        self.tracker.clear_state(
            buffer,
            ResourceState::SHADER_RESOURCE
                | ResourceState::CONSTANT_BUFFER
                | ResourceState::VERTEX_BUFFER
                | ResourceState::INDEX_BUFFER,
        );
    }

    /// Unbind a texture from every SRV slot of every stage
    pub fn unbind_texture_from_input(&mut self, texture: NativeHandle) {
        self.unbind_from_shader_slots(texture, SlotKind::ShaderResource);
        self.tracker.clear_state(texture, ResourceState::SHADER_RESOURCE);
    }

    fn unbind_from_shader_slots(&mut self, resource: NativeHandle, kind: SlotKind) {
        for stage in ShaderStage::ALL {
            for slot in self.committed.slots(stage, kind).slots_holding(resource) {
                self.native.set_shader_slots(stage, kind, slot, &[None]);
                self.committed.slots_mut(stage, kind).set(slot, None, None);
                self.stats.unbind_calls += 1;
                engine_trace!(SOURCE, "Unbound resource from {} {} slot {}", stage, kind, slot);
            }
        }
    }

    fn unbind_from_vertex_buffers(&mut self, buffer: NativeHandle) {
        for slot in 0..self.committed.vertex_buffers.len() {
            if self.committed.vertex_buffers[slot].buffer == Some(buffer) {
                self.native.set_vertex_buffers(slot as u32, &[None], &[0], &[0]);
                self.committed.set_vertex_buffer(slot, CommittedVertexBuffer::default(), None);
                self.stats.unbind_calls += 1;
            }
        }
    }

    fn unbind_from_index_buffer(&mut self, buffer: NativeHandle) {
        if self.committed.index_buffer.is_some_and(|ib| ib.buffer == buffer) {
            self.native.set_index_buffer(None, IndexFormat::U32, 0);
            self.committed.set_index_buffer(None, None);
            self.stats.unbind_calls += 1;
        }
    }

    /// Remove the texture from the render targets and rebind the others
    fn unbind_from_render_targets(&mut self, texture: NativeHandle, roles: ResourceState) {
        let mut changed = false;
        if roles.contains(ResourceState::RENDER_TARGET) {
            for target in self.render_targets.iter_mut() {
                if target.as_ref().is_some_and(|view| view.texture().native_handle() == texture) {
                    *target = None;
                    changed = true;
                }
            }
        }
        if roles.contains(ResourceState::DEPTH_STENCIL)
            && self.depth_stencil.as_ref().is_some_and(|view| view.texture().native_handle() == texture)
        {
            self.depth_stencil = None;
            changed = true;
        }
        if changed {
            self.commit_render_targets();
            self.stats.unbind_calls += 1;
        }
    }

    /// Clear `role` from `resource` unless some committed slot still holds it in that role
    fn release_role_if_unbound(&mut self, resource: NativeHandle, role: ResourceState) {
        let still_bound = if role == ResourceState::CONSTANT_BUFFER {
            self.held_in_shader_slots(resource, SlotKind::ConstantBuffer)
        } else if role == ResourceState::SHADER_RESOURCE {
            self.held_in_shader_slots(resource, SlotKind::ShaderResource)
        } else if role == ResourceState::UNORDERED_ACCESS {
            self.held_in_shader_slots(resource, SlotKind::UnorderedAccess)
        } else if role == ResourceState::VERTEX_BUFFER {
            self.committed.vertex_buffers.iter().any(|vb| vb.buffer == Some(resource))
        } else if role == ResourceState::INDEX_BUFFER {
            self.committed.index_buffer.is_some_and(|ib| ib.buffer == resource)
        } else if role == ResourceState::RENDER_TARGET {
            self.committed.render_targets.holds(resource)
        } else {
            self.committed.depth_stencil.is_some_and(|(_, texture)| texture == resource)
        };
        if !still_bound {
            self.tracker.clear_state(resource, role);
        }
    }

    fn held_in_shader_slots(&self, resource: NativeHandle, kind: SlotKind) -> bool {
        ShaderStage::ALL
            .into_iter()
            .any(|stage| self.committed.slots(stage, kind).holds(resource))
    }

    // ===== INPUT ASSEMBLER =====

    /// Record vertex streams for slots `start_slot..`; `reset` unbinds every
    /// other slot. Streams are committed at the next draw.
    pub fn set_vertex_buffers(&mut self, start_slot: u32, streams: &[VertexStream], reset: bool) -> Result<()> {
        let end = start_slot as usize + streams.len();
        if end > MAX_VERTEX_BUFFER_SLOTS as usize {
            engine_bail!(
                SOURCE,
                "Vertex buffer slots {}..{} exceed the {} available slots",
                start_slot, end, MAX_VERTEX_BUFFER_SLOTS
            );
        }
        if let Some(stream) = streams.iter().find(|s| !s.buffer.bind_flags().contains(BindFlags::VERTEX_BUFFER)) {
            engine_bail!(SOURCE, "Buffer '{}' was not created with the vertex buffer bind flag", stream.buffer.name());
        }
        if reset {
            self.vertex_streams.iter_mut().for_each(|slot| *slot = None);
        }
        for (slot, stream) in self.vertex_streams[start_slot as usize..end].iter_mut().zip(streams) {
            *slot = Some(stream.clone());
        }
        Ok(())
    }

    /// Record the index buffer; `None` unbinds it at the next draw
    pub fn set_index_buffer(&mut self, buffer: Option<Arc<Buffer>>, format: IndexFormat, offset: u64) -> Result<()> {
        if let Some(buffer) = &buffer {
            if !buffer.bind_flags().contains(BindFlags::INDEX_BUFFER) {
                engine_bail!(SOURCE, "Buffer '{}' was not created with the index buffer bind flag", buffer.name());
            }
        }
        self.index_stream = buffer.map(|buffer| IndexStream { buffer, format, offset });
        Ok(())
    }

    fn commit_vertex_buffers(&mut self) {
        let desired: Vec<CommittedVertexBuffer> = self
            .vertex_streams
            .iter()
            .map(|stream| match stream {
                Some(s) => CommittedVertexBuffer { buffer: Some(s.buffer.native_handle()), stride: s.stride, offset: s.offset },
                None => CommittedVertexBuffer::default(),
            })
            .collect();

        let mut changed = MinMaxSlot::new();
        let mut replaced = Vec::new();
        for (slot, wanted) in desired.iter().enumerate() {
            if let Some(buffer) = wanted.buffer {
                self.transition_resource(buffer, ResourceState::VERTEX_BUFFER);
            }
            let committed = self.committed.vertex_buffers[slot];
            if committed != *wanted {
                if let Some(previous) = committed.buffer {
                    replaced.push(previous);
                }
                let buffer = self.vertex_streams[slot].as_ref().map(|s| s.buffer.clone());
                self.committed.set_vertex_buffer(slot, *wanted, buffer);
                changed.add(slot as u32);
            }
        }

        if let Some(range) = changed.range() {
            let slots = &desired[*range.start() as usize..=*range.end() as usize];
            let buffers: Vec<Option<NativeHandle>> = slots.iter().map(|vb| vb.buffer).collect();
            let strides: Vec<u32> = slots.iter().map(|vb| vb.stride).collect();
            let offsets: Vec<u64> = slots.iter().map(|vb| vb.offset).collect();
            self.native.set_vertex_buffers(*range.start(), &buffers, &strides, &offsets);
            if self.kind == ContextKind::Deferred {
                for slot in range {
                    if let Some(buffer) = self.committed.vertex_buffer_object(slot) {
                        self.retained.retain(DeviceObject::from(buffer));
                    }
                }
            }
            self.stats.set_range_calls += 1;
        }
        for buffer in replaced {
            self.release_role_if_unbound(buffer, ResourceState::VERTEX_BUFFER);
        }
    }

    fn commit_index_buffer(&mut self) {
        let wanted = self.index_stream.as_ref().map(|s| CommittedIndexBuffer {
            buffer: s.buffer.native_handle(),
            format: s.format,
            offset: s.offset,
        });
        if let Some(ib) = wanted {
            self.transition_resource(ib.buffer, ResourceState::INDEX_BUFFER);
        }
        if self.committed.index_buffer == wanted {
            return;
        }
        let previous = self.committed.index_buffer.map(|ib| ib.buffer);
        match wanted {
            Some(ib) => self.native.set_index_buffer(Some(ib.buffer), ib.format, ib.offset),
            None => self.native.set_index_buffer(None, IndexFormat::U32, 0),
        }
        let buffer = self.index_stream.as_ref().map(|s| s.buffer.clone());
        if let (Some(buffer), ContextKind::Deferred) = (&buffer, self.kind) {
            self.retained.retain(DeviceObject::from(buffer));
        }
        self.committed.set_index_buffer(wanted, buffer);
        self.stats.set_range_calls += 1;
        if let Some(previous) = previous {
            self.release_role_if_unbound(previous, ResourceState::INDEX_BUFFER);
        }
    }

    // ===== OUTPUT MERGER =====

    /// Bind render targets and a depth-stencil view right away
    ///
    /// Their textures are unbound from shader resource and unordered access
    /// slots first.
    pub fn set_render_targets(&mut self, targets: &[Option<Arc<TextureView>>], depth_stencil: Option<Arc<TextureView>>) -> Result<()> {
        if targets.len() > MAX_RENDER_TARGETS as usize {
            engine_bail!(SOURCE, "{} render targets requested, at most {} are supported", targets.len(), MAX_RENDER_TARGETS);
        }
        if let Some(view) = targets.iter().flatten().find(|v| v.view_type() != TextureViewType::RenderTarget) {
            engine_bail!(SOURCE, "View '{}' bound as a render target is a {} view", view.name(), view.view_type());
        }
        if let Some(view) = depth_stencil.as_ref().filter(|v| v.view_type() != TextureViewType::DepthStencil) {
            engine_bail!(SOURCE, "View '{}' bound as depth stencil is a {} view", view.name(), view.view_type());
        }

        let previous_targets: Vec<NativeHandle> = self
            .render_targets
            .iter()
            .flatten()
            .map(|v| v.texture().native_handle())
            .collect();
        let previous_depth = self.depth_stencil.as_ref().map(|v| v.texture().native_handle());

        for view in targets.iter().flatten() {
            self.transition_resource(view.texture().native_handle(), ResourceState::RENDER_TARGET);
        }
        if let Some(view) = &depth_stencil {
            self.transition_resource(view.texture().native_handle(), ResourceState::DEPTH_STENCIL);
        }

        self.render_targets = targets.to_vec();
        self.depth_stencil = depth_stencil;
        self.commit_render_targets();

        for texture in previous_targets {
            self.release_role_if_unbound(texture, ResourceState::RENDER_TARGET);
        }
        if let Some(texture) = previous_depth {
            self.release_role_if_unbound(texture, ResourceState::DEPTH_STENCIL);
        }
        Ok(())
    }

    fn commit_render_targets(&mut self) {
        let count = self.render_targets.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
        self.render_targets.truncate(count);

        let handles: Vec<Option<NativeHandle>> = self.render_targets.iter().map(|t| t.as_ref().map(|v| v.native_handle())).collect();
        let depth = self.depth_stencil.as_ref().map(|v| (v.native_handle(), v.texture().native_handle()));
        self.native.set_render_targets(&handles, depth.map(|(view, _)| view));
        if self.kind == ContextKind::Deferred {
            for view in self.render_targets.iter().flatten().chain(self.depth_stencil.as_ref()) {
                self.retained.retain(DeviceObject::from(view));
            }
        }

        self.committed.render_targets.clear();
        for (slot, target) in self.render_targets.iter().enumerate() {
            if let Some(view) = target {
                self.committed.render_targets.set(slot as u32, Some(DeviceObject::from(view)), Some(view.texture().native_handle()));
            }
        }
        self.committed.depth_stencil = depth;
    }

    // ===== DRAW / DISPATCH =====

    fn require_pipeline(&self, compute: bool) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            engine_bail!(@UsageError, SOURCE, "No pipeline state is bound");
        };
        if pipeline.is_compute() != compute {
            let expected = if compute { "compute" } else { "graphics" };
            engine_bail!(@UsageError, SOURCE, "Pipeline '{}' is not a {} pipeline", pipeline.name(), expected);
        }
        Ok(())
    }

    pub fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.require_pipeline(false)?;
        self.commit_vertex_buffers();
        self.native.draw(attribs)?;
        self.stats.draws += 1;
        Ok(())
    }

    pub fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.require_pipeline(false)?;
        if self.index_stream.is_none() {
            engine_bail!(@UsageError, SOURCE, "Indexed draw without an index buffer");
        }
        self.commit_vertex_buffers();
        self.commit_index_buffer();
        self.native.draw_indexed(attribs)?;
        self.stats.draws += 1;
        Ok(())
    }

    pub fn dispatch_compute(&mut self, attribs: &DispatchAttribs) -> Result<()> {
        self.require_pipeline(true)?;
        self.native.dispatch(attribs)?;
        self.stats.dispatches += 1;
        Ok(())
    }

    // ===== STATE =====

    /// Unbind everything on the native context and forget every belief
    pub fn invalidate_state(&mut self) {
        self.native.clear_state();
        self.reset_to_baseline();
    }

    pub fn flush(&mut self) {
        self.native.flush();
    }

    fn reset_to_baseline(&mut self) {
        self.committed.reset();
        self.tracker.reset();
        self.pipeline = None;
        self.vertex_streams.iter_mut().for_each(|slot| *slot = None);
        self.index_stream = None;
        self.render_targets.clear();
        self.depth_stencil = None;
    }

    /// Close the recorded work of a deferred context
    ///
    /// The list takes over every object the recorded calls reference. The
    /// context returns to the unbound baseline: empty mirror, no usage
    /// beliefs, no pipeline, no streams.
    pub fn finish_command_list(&mut self) -> Result<CommandList> {
        if self.kind != ContextKind::Deferred {
            engine_bail!(@UsageError, SOURCE, "Command lists can only be finished on deferred contexts");
        }
        let native = self.native.finish_command_list()?;
        let retained = std::mem::take(&mut self.retained);
        self.reset_to_baseline();
        self.stats.command_lists += 1;
        engine_debug!(
            SOURCE,
            "Command list finished with {} native commands referencing {} objects",
            native.command_count(), retained.object_count()
        );
        Ok(CommandList::new(native, retained))
    }

    /// Execute a command list finished on a deferred context
    ///
    /// Execution leaves the native context cleared, so this context also
    /// returns to the unbound baseline.
    pub fn execute_command_list(&mut self, list: &CommandList) -> Result<()> {
        if self.kind != ContextKind::Immediate {
            engine_bail!(@UsageError, SOURCE, "Command lists can only be executed on the immediate context");
        }
        self.native.execute_command_list(list.native())?;
        self.reset_to_baseline();
        Ok(())
    }

    // ===== VERIFICATION =====

    /// Compare the mirror with the native context's bound slots
    ///
    /// Reports the first divergent slot, if any.
    pub fn verify_committed_bindings(&self) -> Option<BindingMismatch> {
        for stage in ShaderStage::ALL {
            for kind in SlotKind::ALL {
                let actual = self.native.bound_resources(stage, kind);
                let mirror = self.committed.slots(stage, kind);
                let end = (actual.len() as u32).max(mirror.high_water());
                for slot in 0..end {
                    let expected = mirror.handle(slot);
                    let native = actual.get(slot as usize).copied().flatten();
                    if expected != native {
                        engine_error!(
                            SOURCE,
                            "{} {} slot {}: committed {:?}, native context holds {:?}",
                            stage, kind, slot, expected, native
                        );
                        return Some(BindingMismatch { stage, kind, slot, expected, actual: native });
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "device_context_tests.rs"]
mod tests;
