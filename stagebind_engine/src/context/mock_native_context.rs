/// Mock native context for unit tests (no backend required)
///
/// Records every native call in order and keeps per-stage slot tables that
/// serve as ground truth. The recording is shared through [`MockProbe`], so
/// tests can still inspect it after the context is boxed into a
/// `DeviceContext`.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};
use crate::context::native_context::{
    DispatchAttribs, DrawAttribs, DrawIndexedAttribs, IndexFormat, NativeCommandList, NativeContext,
};
use crate::device::NativeHandle;
use crate::error::Result;
use crate::shader::{ShaderStage, SlotKind};
use crate::engine_bail;

// ============================================================================
// Recorded calls
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    SetShader { stage: ShaderStage, shader: Option<NativeHandle> },
    SetSlots { stage: ShaderStage, kind: SlotKind, start_slot: u32, handles: Vec<Option<NativeHandle>> },
    SetVertexBuffers { start_slot: u32, buffers: Vec<Option<NativeHandle>> },
    SetIndexBuffer { buffer: Option<NativeHandle> },
    SetRenderTargets { targets: Vec<Option<NativeHandle>>, depth_stencil: Option<NativeHandle> },
    Draw,
    DrawIndexed,
    Dispatch,
    ClearState,
    Flush,
    FinishCommandList,
    ExecuteCommandList { command_count: usize },
}

impl NativeCall {
    /// Set-range call of `kind` in `stage`
    pub fn is_set_slots(&self, stage: ShaderStage, kind: SlotKind) -> bool {
        matches!(self, NativeCall::SetSlots { stage: s, kind: k, .. } if *s == stage && *k == kind)
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<NativeCall>,
    /// Ground truth slot tables, indexed by stage then slot kind
    pub slots: Vec<Vec<Vec<Option<NativeHandle>>>>,
    pub vertex_buffers: Vec<Option<NativeHandle>>,
    pub index_buffer: Option<NativeHandle>,
    pub render_targets: Vec<Option<NativeHandle>>,
    pub depth_stencil: Option<NativeHandle>,
}

impl MockState {
    fn new() -> Self {
        let mut state = Self::default();
        state.clear_bindings();
        state
    }

    fn clear_bindings(&mut self) {
        self.slots = (0..ShaderStage::COUNT)
            .map(|_| SlotKind::ALL.iter().map(|kind| vec![None; kind.max_slots() as usize]).collect())
            .collect();
        self.vertex_buffers = vec![None; crate::shader::MAX_VERTEX_BUFFER_SLOTS as usize];
        self.index_buffer = None;
        self.render_targets.clear();
        self.depth_stencil = None;
    }

    pub fn slot(&self, stage: ShaderStage, kind: SlotKind, slot: u32) -> Option<NativeHandle> {
        self.slots[stage.index()][kind.index()][slot as usize]
    }
}

/// Shared view of a mock context's recording
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls, keep the slot tables
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn slot(&self, stage: ShaderStage, kind: SlotKind, slot: u32) -> Option<NativeHandle> {
        self.state().slot(stage, kind, slot)
    }

    /// Recorded set-range calls of `kind` in `stage`
    pub fn set_slot_calls(&self, stage: ShaderStage, kind: SlotKind) -> Vec<NativeCall> {
        self.calls().into_iter().filter(|c| c.is_set_slots(stage, kind)).collect()
    }
}

// ============================================================================
// Mock context
// ============================================================================

#[derive(Debug)]
pub struct MockCommandList {
    pub calls: Vec<NativeCall>,
}

impl NativeCommandList for MockCommandList {
    fn command_count(&self) -> usize {
        self.calls.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockNativeContext {
    state: Arc<Mutex<MockState>>,
    deferred: bool,
    recorded: Vec<NativeCall>,
}

impl MockNativeContext {
    pub fn new(deferred: bool) -> (Self, MockProbe) {
        let state = Arc::new(Mutex::new(MockState::new()));
        let probe = MockProbe { state: state.clone() };
        (Self { state, deferred, recorded: Vec::new() }, probe)
    }

    fn record(&mut self, call: NativeCall) {
        if self.deferred {
            self.recorded.push(call.clone());
        }
        self.state.lock().unwrap().calls.push(call);
    }

    fn write_slots(&mut self, stage: ShaderStage, kind: SlotKind, start_slot: u32, handles: &[Option<NativeHandle>]) {
        {
            let mut state = self.state.lock().unwrap();
            let table = &mut state.slots[stage.index()][kind.index()];
            for (offset, handle) in handles.iter().enumerate() {
                table[start_slot as usize + offset] = *handle;
            }
        }
        self.record(NativeCall::SetSlots { stage, kind, start_slot, handles: handles.to_vec() });
    }
}

impl NativeContext for MockNativeContext {
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>) {
        self.record(NativeCall::SetShader { stage, shader });
    }

    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeHandle>]) {
        self.write_slots(stage, SlotKind::ConstantBuffer, start_slot, buffers);
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        self.write_slots(stage, SlotKind::ShaderResource, start_slot, views);
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeHandle>]) {
        self.write_slots(stage, SlotKind::Sampler, start_slot, samplers);
    }

    fn set_unordered_access_views(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        self.write_slots(stage, SlotKind::UnorderedAccess, start_slot, views);
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[Option<NativeHandle>], _strides: &[u32], _offsets: &[u64]) {
        {
            let mut state = self.state.lock().unwrap();
            for (offset, buffer) in buffers.iter().enumerate() {
                state.vertex_buffers[start_slot as usize + offset] = *buffer;
            }
        }
        self.record(NativeCall::SetVertexBuffers { start_slot, buffers: buffers.to_vec() });
    }

    fn set_index_buffer(&mut self, buffer: Option<NativeHandle>, _format: IndexFormat, _offset: u64) {
        self.state.lock().unwrap().index_buffer = buffer;
        self.record(NativeCall::SetIndexBuffer { buffer });
    }

    fn set_render_targets(&mut self, targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>) {
        {
            let mut state = self.state.lock().unwrap();
            state.render_targets = targets.to_vec();
            state.depth_stencil = depth_stencil;
        }
        self.record(NativeCall::SetRenderTargets { targets: targets.to_vec(), depth_stencil });
    }

    fn draw(&mut self, _attribs: &DrawAttribs) -> Result<()> {
        self.record(NativeCall::Draw);
        Ok(())
    }

    fn draw_indexed(&mut self, _attribs: &DrawIndexedAttribs) -> Result<()> {
        self.record(NativeCall::DrawIndexed);
        Ok(())
    }

    fn dispatch(&mut self, _attribs: &DispatchAttribs) -> Result<()> {
        self.record(NativeCall::Dispatch);
        Ok(())
    }

    fn clear_state(&mut self) {
        self.state.lock().unwrap().clear_bindings();
        self.record(NativeCall::ClearState);
    }

    fn flush(&mut self) {
        self.record(NativeCall::Flush);
    }

    fn bound_resources(&self, stage: ShaderStage, kind: SlotKind) -> Vec<Option<NativeHandle>> {
        self.state.lock().unwrap().slots[stage.index()][kind.index()].clone()
    }

    fn finish_command_list(&mut self) -> Result<Box<dyn NativeCommandList>> {
        if !self.deferred {
            engine_bail!(@UsageError, "stagebind::mock", "Immediate mock context cannot finish a command list");
        }
        let calls = std::mem::take(&mut self.recorded);
        self.state.lock().unwrap().clear_bindings();
        self.state.lock().unwrap().calls.push(NativeCall::FinishCommandList);
        Ok(Box::new(MockCommandList { calls }))
    }

    fn execute_command_list(&mut self, list: &dyn NativeCommandList) -> Result<()> {
        let Some(list) = list.as_any().downcast_ref::<MockCommandList>() else {
            engine_bail!(@BackendError, "stagebind::mock", "Command list was not recorded by a mock context");
        };
        self.state.lock().unwrap().clear_bindings();
        self.record(NativeCall::ExecuteCommandList { command_count: list.calls.len() });
        Ok(())
    }
}
