/// Soft context - slot-based execution context implemented in software
///
/// Keeps real per-stage slot tables, input assembler and output merger
/// bindings. Every native call goes through `apply`, which validates the
/// call, feeds the debug layer and, on deferred contexts, records it for
/// replay. Hazards (a resource bound in a role that conflicts with one it
/// already holds) are counted, never resolved: the caller is expected to
/// unbind first.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use stagebind_engine::stagebind::binding::ResourceState;
use stagebind_engine::stagebind::context::{
    DispatchAttribs, DrawAttribs, DrawIndexedAttribs, IndexFormat, NativeCommandList, NativeContext,
};
use stagebind_engine::stagebind::device::{NativeHandle, NativeObjectKind, NativeObjectRegistry};
use stagebind_engine::stagebind::shader::{ShaderStage, SlotKind, MAX_RENDER_TARGETS, MAX_VERTEX_BUFFER_SLOTS};
use stagebind_engine::stagebind::Result;
use stagebind_engine::{engine_bail, engine_debug};
use crate::debug::{SoftDebug, SoftStatsTracker};
use crate::soft_command_list::{SoftCommand, SoftCommandList};

const SOURCE: &str = "stagebind::soft";

/// Role a shader slot kind puts its resources in
fn slot_role(kind: SlotKind) -> Option<ResourceState> {
    match kind {
        SlotKind::ConstantBuffer => Some(ResourceState::CONSTANT_BUFFER),
        SlotKind::ShaderResource => Some(ResourceState::SHADER_RESOURCE),
        SlotKind::UnorderedAccess => Some(ResourceState::UNORDERED_ACCESS),
        SlotKind::Sampler => None,
    }
}

type SlotTables = [Vec<Option<NativeHandle>>; SlotKind::COUNT];

fn empty_tables() -> SlotTables {
    SlotKind::ALL.map(|kind| vec![None; kind.max_slots() as usize])
}

pub struct SoftContext {
    registry: NativeObjectRegistry,
    deferred: bool,
    shaders: [Option<NativeHandle>; ShaderStage::COUNT],
    slots: Vec<SlotTables>,
    vertex_buffers: Vec<Option<NativeHandle>>,
    index_buffer: Option<NativeHandle>,
    render_targets: Vec<Option<NativeHandle>>,
    depth_stencil: Option<NativeHandle>,
    recorded: Vec<SoftCommand>,
    stats: Arc<SoftStatsTracker>,
}

impl SoftContext {
    /// New soft context resolving handles through `registry`
    ///
    /// Pass the registry of the device whose objects will be bound
    /// (`RenderDevice::object_registry`).
    pub fn new(registry: NativeObjectRegistry, deferred: bool) -> Self {
        engine_debug!(SOURCE, "{} soft context created", if deferred { "Deferred" } else { "Immediate" });
        Self {
            registry,
            deferred,
            shaders: [None; ShaderStage::COUNT],
            slots: (0..ShaderStage::COUNT).map(|_| empty_tables()).collect(),
            vertex_buffers: vec![None; MAX_VERTEX_BUFFER_SLOTS as usize],
            index_buffer: None,
            render_targets: Vec::new(),
            depth_stencil: None,
            recorded: Vec::new(),
            stats: Arc::new(SoftStatsTracker::default()),
        }
    }

    pub fn immediate(registry: NativeObjectRegistry) -> Self {
        Self::new(registry, false)
    }

    pub fn deferred(registry: NativeObjectRegistry) -> Self {
        Self::new(registry, true)
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Statistics handle that stays valid after the context is boxed
    pub fn debug(&self) -> SoftDebug {
        SoftDebug::new(self.stats.clone())
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<NativeHandle> {
        self.shaders[stage.index()]
    }

    pub fn vertex_buffers(&self) -> &[Option<NativeHandle>] {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<NativeHandle> {
        self.index_buffer
    }

    pub fn render_targets(&self) -> &[Option<NativeHandle>] {
        &self.render_targets
    }

    pub fn depth_stencil(&self) -> Option<NativeHandle> {
        self.depth_stencil
    }

    // ===== DEBUG LAYER =====

    fn report_hazard(&self, message: String) {
        self.stats.increment_hazard();
        #[cfg(feature = "soft-debug-log")]
        stagebind_engine::engine_warn!(SOURCE, "Hazard: {}", message);
        #[cfg(not(feature = "soft-debug-log"))]
        let _ = message;
    }

    fn report_misuse(&self, message: String) {
        self.stats.increment_misuse();
        #[cfg(feature = "soft-debug-log")]
        stagebind_engine::engine_warn!(SOURCE, "Ignored call: {}", message);
        #[cfg(not(feature = "soft-debug-log"))]
        let _ = message;
    }

    fn object_name(&self, handle: NativeHandle) -> String {
        self.registry.get(handle).map(|info| info.name).unwrap_or_else(|| format!("{:?}", handle))
    }

    /// Role set every currently bound resource holds
    fn bound_roles(&self) -> FxHashMap<NativeHandle, ResourceState> {
        let mut roles: FxHashMap<NativeHandle, ResourceState> = FxHashMap::default();
        let mut add = |handle: &Option<NativeHandle>, role: ResourceState| {
            if let Some(resource) = handle.and_then(|h| self.registry.resource_of(h)) {
                *roles.entry(resource).or_insert(ResourceState::empty()) |= role;
            }
        };
        for tables in &self.slots {
            for kind in SlotKind::ALL {
                if let Some(role) = slot_role(kind) {
                    tables[kind.index()].iter().for_each(|h| add(h, role));
                }
            }
        }
        self.vertex_buffers.iter().for_each(|h| add(h, ResourceState::VERTEX_BUFFER));
        add(&self.index_buffer, ResourceState::INDEX_BUFFER);
        self.render_targets.iter().for_each(|h| add(h, ResourceState::RENDER_TARGET));
        add(&self.depth_stencil, ResourceState::DEPTH_STENCIL);
        roles
    }

    /// Validate one handle about to be bound in `role`; false when the call must be ignored
    fn check_binding(
        &self,
        bound: &FxHashMap<NativeHandle, ResourceState>,
        handle: NativeHandle,
        role: Option<ResourceState>,
        location: &str,
    ) -> bool {
        let Some(info) = self.registry.get(handle) else {
            self.report_misuse(format!("unknown native handle {:?} bound to {}", handle, location));
            return false;
        };
        if matches!(info.kind, NativeObjectKind::Shader) {
            self.report_misuse(format!("shader '{}' bound to {}", info.name, location));
            return false;
        }
        let (Some(role), Some(resource)) = (role, self.registry.resource_of(handle)) else {
            return true;
        };
        if let Some(held) = bound.get(&resource) {
            let conflicts = *held & role.conflicting_roles();
            if !conflicts.is_empty() {
                self.report_hazard(format!(
                    "'{}' bound to {} while still bound as {:?}",
                    self.object_name(resource), location, conflicts
                ));
            }
        }
        true
    }

    fn clear_bindings(&mut self) {
        self.shaders = [None; ShaderStage::COUNT];
        self.slots.iter_mut().for_each(|tables| *tables = empty_tables());
        self.vertex_buffers.fill(None);
        self.index_buffer = None;
        self.render_targets.clear();
        self.depth_stencil = None;
    }

    // ===== EXECUTION =====

    fn apply(&mut self, command: SoftCommand) {
        if self.deferred {
            self.recorded.push(command.clone());
        }
        match command {
            SoftCommand::SetShader { stage, shader } => self.apply_shader(stage, shader),
            SoftCommand::SetSlots { stage, kind, start_slot, handles } => self.apply_slots(stage, kind, start_slot, &handles),
            SoftCommand::SetVertexBuffers { start_slot, buffers, .. } => self.apply_vertex_buffers(start_slot, &buffers),
            SoftCommand::SetIndexBuffer { buffer, .. } => self.apply_index_buffer(buffer),
            SoftCommand::SetRenderTargets { targets, depth_stencil } => self.apply_render_targets(&targets, depth_stencil),
            SoftCommand::Draw(_) => self.apply_draw(false),
            SoftCommand::DrawIndexed(_) => self.apply_draw(true),
            SoftCommand::Dispatch(_) => self.apply_dispatch(),
            SoftCommand::ClearState => self.clear_bindings(),
        }
    }

    fn apply_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>) {
        if let Some(handle) = shader {
            let is_shader = self.registry.get(handle).is_some_and(|info| info.kind == NativeObjectKind::Shader);
            if !is_shader {
                self.report_misuse(format!("{} stage given a non-shader handle {:?}", stage, handle));
                return;
            }
        }
        self.shaders[stage.index()] = shader;
    }

    fn apply_slots(&mut self, stage: ShaderStage, kind: SlotKind, start_slot: u32, handles: &[Option<NativeHandle>]) {
        let end = start_slot as usize + handles.len();
        if end > kind.max_slots() as usize {
            self.report_misuse(format!("{} {} slots {}..{} out of range", stage, kind, start_slot, end));
            return;
        }
        if kind == SlotKind::UnorderedAccess && !stage.supports_unordered_access() {
            self.report_misuse(format!("unordered access views bound to the {} stage", stage));
            return;
        }

        let bound = self.bound_roles();
        let role = slot_role(kind);
        let mut accepted = Vec::with_capacity(handles.len());
        for (offset, handle) in handles.iter().enumerate() {
            let slot = start_slot as usize + offset;
            let keep = match handle {
                Some(h) => self.check_binding(&bound, *h, role, &format!("{} {} slot {}", stage, kind, slot)),
                None => true,
            };
            accepted.push(if keep { *handle } else { None });
        }

        self.slots[stage.index()][kind.index()][start_slot as usize..end].copy_from_slice(&accepted);
        self.stats.record_set_range(handles.len());
    }

    fn apply_vertex_buffers(&mut self, start_slot: u32, buffers: &[Option<NativeHandle>]) {
        let end = start_slot as usize + buffers.len();
        if end > MAX_VERTEX_BUFFER_SLOTS as usize {
            self.report_misuse(format!("vertex buffer slots {}..{} out of range", start_slot, end));
            return;
        }
        let bound = self.bound_roles();
        for (offset, buffer) in buffers.iter().enumerate() {
            let slot = start_slot as usize + offset;
            let keep = match buffer {
                Some(h) => self.check_binding(&bound, *h, Some(ResourceState::VERTEX_BUFFER), &format!("vertex buffer slot {}", slot)),
                None => true,
            };
            self.vertex_buffers[slot] = if keep { *buffer } else { None };
        }
    }

    fn apply_index_buffer(&mut self, buffer: Option<NativeHandle>) {
        if let Some(handle) = buffer {
            let bound = self.bound_roles();
            if !self.check_binding(&bound, handle, Some(ResourceState::INDEX_BUFFER), "the index buffer") {
                return;
            }
        }
        self.index_buffer = buffer;
    }

    fn apply_render_targets(&mut self, targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>) {
        if targets.len() > MAX_RENDER_TARGETS as usize {
            self.report_misuse(format!("{} render targets bound", targets.len()));
            return;
        }
        // The previous output bindings are replaced as a whole
        self.render_targets.clear();
        self.depth_stencil = None;

        let bound = self.bound_roles();
        for (slot, target) in targets.iter().enumerate() {
            let keep = match target {
                Some(h) => self.check_binding(&bound, *h, Some(ResourceState::RENDER_TARGET), &format!("render target {}", slot)),
                None => true,
            };
            self.render_targets.push(if keep { *target } else { None });
        }
        if let Some(view) = depth_stencil {
            if self.check_binding(&bound, view, Some(ResourceState::DEPTH_STENCIL), "the depth stencil") {
                self.depth_stencil = Some(view);
            }
        }
    }

    fn apply_draw(&mut self, indexed: bool) {
        if self.shaders[ShaderStage::Vertex.index()].is_none() {
            self.report_misuse("draw without a vertex shader".to_string());
            return;
        }
        if indexed && self.index_buffer.is_none() {
            self.report_misuse("indexed draw without an index buffer".to_string());
            return;
        }
        self.stats.increment_draw();
    }

    fn apply_dispatch(&mut self) {
        if self.shaders[ShaderStage::Compute.index()].is_none() {
            self.report_misuse("dispatch without a compute shader".to_string());
            return;
        }
        self.stats.increment_dispatch();
    }
}

impl NativeContext for SoftContext {
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>) {
        self.apply(SoftCommand::SetShader { stage, shader });
    }

    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeHandle>]) {
        self.apply(SoftCommand::SetSlots { stage, kind: SlotKind::ConstantBuffer, start_slot, handles: buffers.to_vec() });
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        self.apply(SoftCommand::SetSlots { stage, kind: SlotKind::ShaderResource, start_slot, handles: views.to_vec() });
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeHandle>]) {
        self.apply(SoftCommand::SetSlots { stage, kind: SlotKind::Sampler, start_slot, handles: samplers.to_vec() });
    }

    fn set_unordered_access_views(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        self.apply(SoftCommand::SetSlots { stage, kind: SlotKind::UnorderedAccess, start_slot, handles: views.to_vec() });
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[Option<NativeHandle>], strides: &[u32], offsets: &[u64]) {
        self.apply(SoftCommand::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
            strides: strides.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, buffer: Option<NativeHandle>, format: IndexFormat, offset: u64) {
        self.apply(SoftCommand::SetIndexBuffer { buffer, format, offset });
    }

    fn set_render_targets(&mut self, targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>) {
        self.apply(SoftCommand::SetRenderTargets { targets: targets.to_vec(), depth_stencil });
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.apply(SoftCommand::Draw(*attribs));
        Ok(())
    }

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.apply(SoftCommand::DrawIndexed(*attribs));
        Ok(())
    }

    fn dispatch(&mut self, attribs: &DispatchAttribs) -> Result<()> {
        self.apply(SoftCommand::Dispatch(*attribs));
        Ok(())
    }

    fn clear_state(&mut self) {
        self.apply(SoftCommand::ClearState);
    }

    fn flush(&mut self) {}

    fn bound_resources(&self, stage: ShaderStage, kind: SlotKind) -> Vec<Option<NativeHandle>> {
        self.slots[stage.index()][kind.index()].clone()
    }

    fn finish_command_list(&mut self) -> Result<Box<dyn NativeCommandList>> {
        if !self.deferred {
            engine_bail!(@UsageError, SOURCE, "Immediate soft context cannot finish a command list");
        }
        let commands = std::mem::take(&mut self.recorded);
        self.clear_bindings();
        self.stats.increment_recorded();
        Ok(Box::new(SoftCommandList::new(commands)))
    }

    fn execute_command_list(&mut self, list: &dyn NativeCommandList) -> Result<()> {
        if self.deferred {
            engine_bail!(@UsageError, SOURCE, "Deferred soft context cannot execute a command list");
        }
        let Some(list) = list.as_any().downcast_ref::<SoftCommandList>() else {
            engine_bail!(@BackendError, SOURCE, "Command list was not recorded by a soft context");
        };
        self.clear_bindings();
        for command in list.commands() {
            self.apply(command.clone());
        }
        self.clear_bindings();
        self.stats.increment_executed();
        Ok(())
    }
}

#[cfg(test)]
#[path = "soft_context_tests.rs"]
mod tests;
