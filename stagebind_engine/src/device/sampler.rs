/// Engine-level sampler object

use crate::device::native::{NativeHandle, NativeSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    Point,
    #[default]
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

/// Sampler creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDesc {
    pub name: String,
    pub filter: FilterType,
    pub address_mode: AddressMode,
}

impl SamplerDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: FilterType::default(),
            address_mode: AddressMode::default(),
        }
    }
}

#[derive(Debug)]
pub struct Sampler {
    desc: SamplerDesc,
    native: NativeSlot,
}

impl Sampler {
    pub(crate) fn new(desc: SamplerDesc, native: NativeSlot) -> Self {
        Self { desc, native }
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native.handle()
    }
}
