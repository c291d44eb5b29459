/// Hardware slot kinds and per-stage slot limits

use std::fmt;

/// Constant-buffer slots per stage
pub const MAX_CONSTANT_BUFFER_SLOTS: u32 = 14;
/// Shader-resource-view slots per stage
pub const MAX_SHADER_RESOURCE_SLOTS: u32 = 128;
/// Sampler slots per stage
pub const MAX_SAMPLER_SLOTS: u32 = 16;
/// Unordered-access-view slots per stage
pub const MAX_UNORDERED_ACCESS_SLOTS: u32 = 8;
/// Input-assembler vertex buffer slots
pub const MAX_VERTEX_BUFFER_SLOTS: u32 = 32;
/// Simultaneous render targets
pub const MAX_RENDER_TARGETS: u32 = 8;

/// One of the four per-stage slot arrays of the execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKind {
    ConstantBuffer,
    ShaderResource,
    Sampler,
    UnorderedAccess,
}

impl SlotKind {
    pub const COUNT: usize = 4;

    /// Commit order
    pub const ALL: [SlotKind; SlotKind::COUNT] = [
        SlotKind::ConstantBuffer,
        SlotKind::ShaderResource,
        SlotKind::Sampler,
        SlotKind::UnorderedAccess,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn max_slots(self) -> u32 {
        match self {
            SlotKind::ConstantBuffer => MAX_CONSTANT_BUFFER_SLOTS,
            SlotKind::ShaderResource => MAX_SHADER_RESOURCE_SLOTS,
            SlotKind::Sampler => MAX_SAMPLER_SLOTS,
            SlotKind::UnorderedAccess => MAX_UNORDERED_ACCESS_SLOTS,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::ConstantBuffer => "constant buffer",
            SlotKind::ShaderResource => "shader resource",
            SlotKind::Sampler => "sampler",
            SlotKind::UnorderedAccess => "unordered access",
        };
        f.write_str(name)
    }
}

/// Number of slots of each kind a cache provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotCounts {
    pub constant_buffers: u32,
    pub shader_resources: u32,
    pub samplers: u32,
    pub unordered_access: u32,
}

impl SlotCounts {
    pub fn new(constant_buffers: u32, shader_resources: u32, samplers: u32, unordered_access: u32) -> Self {
        Self { constant_buffers, shader_resources, samplers, unordered_access }
    }

    pub fn get(&self, kind: SlotKind) -> u32 {
        match kind {
            SlotKind::ConstantBuffer => self.constant_buffers,
            SlotKind::ShaderResource => self.shader_resources,
            SlotKind::Sampler => self.samplers,
            SlotKind::UnorderedAccess => self.unordered_access,
        }
    }

    pub fn set(&mut self, kind: SlotKind, count: u32) {
        match kind {
            SlotKind::ConstantBuffer => self.constant_buffers = count,
            SlotKind::ShaderResource => self.shader_resources = count,
            SlotKind::Sampler => self.samplers = count,
            SlotKind::UnorderedAccess => self.unordered_access = count,
        }
    }

    /// Grow `kind` so that it covers `end` slots
    pub fn include(&mut self, kind: SlotKind, end: u32) {
        if end > self.get(kind) {
            self.set(kind, end);
        }
    }

    /// First slot kind whose count exceeds its hardware limit
    pub fn first_over_limit(&self) -> Option<SlotKind> {
        SlotKind::ALL.into_iter().find(|&kind| self.get(kind) > kind.max_slots())
    }

    pub fn total(&self) -> u32 {
        self.constant_buffers + self.shader_resources + self.samplers + self.unordered_access
    }
}
