//! Engine configuration
//!
//! The binding engine behaves identically whatever the configuration says;
//! the flags only switch diagnostic checks (and their logging) on or off.

/// Diagnostics configuration shared by a device and every context it creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Application name (appears in log lines of some backends)
    pub app_name: String,

    /// Report unbound shader variables and missing static resources at commit time
    pub verify_shader_bindings: bool,

    /// Report resources that are not in the required state when committing
    /// without transitions
    pub verify_resource_states: bool,

    /// Compare the committed mirror with the native context after every commit
    pub verify_context_bindings: bool,
}

impl Default for Config {
    fn default() -> Self {
        let diagnostics = cfg!(debug_assertions);
        Self {
            app_name: "Stagebind Application".to_string(),
            verify_shader_bindings: diagnostics,
            verify_resource_states: diagnostics,
            verify_context_bindings: diagnostics,
        }
    }
}

impl Config {
    /// Every diagnostic check disabled
    pub fn release() -> Self {
        Self {
            verify_shader_bindings: false,
            verify_resource_states: false,
            verify_context_bindings: false,
            ..Self::default()
        }
    }

    /// Every diagnostic check enabled, regardless of build profile
    pub fn diagnostics() -> Self {
        Self {
            verify_shader_bindings: true,
            verify_resource_states: true,
            verify_context_bindings: true,
            ..Self::default()
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }
}
