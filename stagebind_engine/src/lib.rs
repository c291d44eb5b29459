/*!
# Stagebind Engine

Shader resource binding and state management for slot-based graphics
execution contexts.

The engine tracks which buffers, textures and samplers are attached to which
slots of which shader stage, resolves usage hazards when a resource is
requested in mutually exclusive roles, and commits only the slot ranges that
changed since the last commit. Native execution contexts plug in through the
[`NativeContext`](stagebind::context::NativeContext) trait; the
`stagebind_engine_context_soft` crate provides a software one.

## Architecture

- **ResourceCache**: per-stage slot arrays of bound objects and native handles
- **ResourceLayout**: maps a shader's reflected variables onto cache slots
- **Pipeline**: shaders plus the caches holding their static resources
- **ShaderResourceBinding**: mutable and dynamic resources of one pipeline
- **DeviceContext**: the commit engine, with its mirror and usage state tracker
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod device;
pub mod shader;
pub mod binding;
pub mod context;

#[cfg(test)]
mod test_support;

// Main stagebind namespace module
pub mod stagebind {
    // Error types
    pub use crate::error::{Error, Result};

    // Global logger hub
    pub use crate::engine::Engine;

    // Diagnostics configuration
    pub use crate::config::Config;

    // Device and the objects it creates
    pub use crate::device::RenderDevice;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod device {
        pub use crate::device::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod binding {
        pub use crate::binding::*;
    }

    pub mod context {
        pub use crate::context::*;
    }
}
