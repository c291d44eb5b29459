/// NativeContext trait - the slot-based execution context the engine drives
///
/// A native context exposes one set-range entry point per slot kind; the
/// stage is a parameter. Every slot argument is a native handle or `None`
/// (unbind). Implementations apply calls in issue order and never call back
/// into the engine.

use std::any::Any;
use std::fmt;
use crate::device::NativeHandle;
use crate::error::Result;
use crate::shader::{ShaderStage, SlotKind};

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size_bytes(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Non-indexed draw parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawAttribs {
    pub vertex_count: u32,
    pub start_vertex: u32,
    pub instance_count: u32,
    pub first_instance: u32,
}

impl DrawAttribs {
    pub fn new(vertex_count: u32) -> Self {
        Self { vertex_count, start_vertex: 0, instance_count: 1, first_instance: 0 }
    }
}

/// Indexed draw parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedAttribs {
    pub index_count: u32,
    pub first_index: u32,
    /// Value added to each index before reading the vertex buffer
    pub base_vertex: i32,
    pub instance_count: u32,
    pub first_instance: u32,
}

impl DrawIndexedAttribs {
    pub fn new(index_count: u32) -> Self {
        Self { index_count, first_index: 0, base_vertex: 0, instance_count: 1, first_instance: 0 }
    }
}

/// Compute dispatch group counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchAttribs {
    pub groups_x: u32,
    pub groups_y: u32,
    pub groups_z: u32,
}

impl DispatchAttribs {
    pub fn new(groups_x: u32, groups_y: u32, groups_z: u32) -> Self {
        Self { groups_x, groups_y, groups_z }
    }
}

/// Recorded work of a deferred native context
pub trait NativeCommandList: Send + fmt::Debug {
    /// Number of recorded native calls
    fn command_count(&self) -> usize;

    /// Downcast access for the native context that executes the list
    fn as_any(&self) -> &dyn Any;
}

/// Slot-based execution context
pub trait NativeContext: Send {
    /// Bind `shader` to `stage`; `None` disables the stage
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>);

    /// Set constant buffer slots `start_slot..start_slot + buffers.len()`
    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeHandle>]);

    /// Set shader resource view slots
    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]);

    /// Set sampler slots
    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeHandle>]);

    /// Set unordered access view slots
    fn set_unordered_access_views(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]);

    /// Set vertex buffer slots; `strides` and `offsets` match `buffers` in length
    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[Option<NativeHandle>], strides: &[u32], offsets: &[u64]);

    fn set_index_buffer(&mut self, buffer: Option<NativeHandle>, format: IndexFormat, offset: u64);

    /// Replace every render target and the depth-stencil view
    fn set_render_targets(&mut self, targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>);

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()>;

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()>;

    fn dispatch(&mut self, attribs: &DispatchAttribs) -> Result<()>;

    /// Unbind everything: shaders, every slot, streams and render targets
    fn clear_state(&mut self);

    fn flush(&mut self);

    /// Handles currently bound to every slot of `kind` in `stage`
    ///
    /// This is the ground truth the engine verifies its mirror against.
    fn bound_resources(&self, stage: ShaderStage, kind: SlotKind) -> Vec<Option<NativeHandle>>;

    /// Close the recorded work of a deferred context
    ///
    /// The context state is cleared afterwards.
    fn finish_command_list(&mut self) -> Result<Box<dyn NativeCommandList>>;

    /// Replay a finished command list; the context state is cleared before
    /// and after execution
    fn execute_command_list(&mut self, list: &dyn NativeCommandList) -> Result<()>;

    /// Set-range call for `kind`, dispatched to the matching entry point
    fn set_shader_slots(&mut self, stage: ShaderStage, kind: SlotKind, start_slot: u32, handles: &[Option<NativeHandle>]) {
        match kind {
            SlotKind::ConstantBuffer => self.set_constant_buffers(stage, start_slot, handles),
            SlotKind::ShaderResource => self.set_shader_resources(stage, start_slot, handles),
            SlotKind::Sampler => self.set_samplers(stage, start_slot, handles),
            SlotKind::UnorderedAccess => self.set_unordered_access_views(stage, start_slot, handles),
        }
    }
}
