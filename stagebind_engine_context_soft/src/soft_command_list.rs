/// Soft command list - calls recorded by a deferred soft context

use std::any::Any;
use stagebind_engine::stagebind::context::{
    DispatchAttribs, DrawAttribs, DrawIndexedAttribs, IndexFormat, NativeCommandList,
};
use stagebind_engine::stagebind::device::NativeHandle;
use stagebind_engine::stagebind::shader::{ShaderStage, SlotKind};

/// One recorded native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftCommand {
    SetShader { stage: ShaderStage, shader: Option<NativeHandle> },
    SetSlots { stage: ShaderStage, kind: SlotKind, start_slot: u32, handles: Vec<Option<NativeHandle>> },
    SetVertexBuffers { start_slot: u32, buffers: Vec<Option<NativeHandle>>, strides: Vec<u32>, offsets: Vec<u64> },
    SetIndexBuffer { buffer: Option<NativeHandle>, format: IndexFormat, offset: u64 },
    SetRenderTargets { targets: Vec<Option<NativeHandle>>, depth_stencil: Option<NativeHandle> },
    Draw(DrawAttribs),
    DrawIndexed(DrawIndexedAttribs),
    Dispatch(DispatchAttribs),
    ClearState,
}

#[derive(Debug)]
pub struct SoftCommandList {
    commands: Vec<SoftCommand>,
}

impl SoftCommandList {
    pub(crate) fn new(commands: Vec<SoftCommand>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[SoftCommand] {
        &self.commands
    }
}

impl NativeCommandList for SoftCommandList {
    fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
