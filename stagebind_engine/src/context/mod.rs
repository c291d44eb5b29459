/// Context module - native execution contexts and the commit engine driving them

pub mod native_context;
pub mod committed_state;
pub mod command_list;
pub mod device_context;

#[cfg(test)]
pub(crate) mod mock_native_context;

pub use native_context::{
    NativeContext, NativeCommandList, IndexFormat,
    DrawAttribs, DrawIndexedAttribs, DispatchAttribs,
};
pub use committed_state::{CommittedState, CommittedSlots, MinMaxSlot};
pub use command_list::CommandList;
pub use device_context::{
    DeviceContext, ContextKind, ContextStats, ResourceStateTransitionMode,
    StateTransition, BindingMismatch, VertexStream,
};
