//! Error types for the stagebind engine
//!
//! This module defines the error type used throughout the engine, covering
//! native backend failures, invalid objects, initialization and API misuse.

use std::fmt;

/// Result type for stagebind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stagebind engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Native execution context error (lost device, bad command list, etc.)
    BackendError(String),

    /// Invalid object (buffer, view, shader reflection, pipeline, etc.)
    InvalidResource(String),

    /// Initialization failed (cache, binding, context)
    InitializationFailed(String),

    /// API used in the wrong order or the wrong number of times
    UsageError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UsageError(msg) => write!(f, "Usage error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error through the engine logger and build it
///
/// The variant defaults to `InvalidResource`; prefix the arguments with
/// `@Variant,` to pick another one.
///
/// # Example
///
/// ```no_run
/// # use stagebind_engine::engine_err;
/// let err = engine_err!("stagebind::Pipeline", "Stage {} declared twice", "Vertex");
/// let usage = engine_err!(@UsageError, "stagebind::ResourceCache", "Cache already initialized");
/// ```
#[macro_export]
macro_rules! engine_err {
    (@$variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::stagebind::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_err!(@InvalidResource, $source, $($arg)*)
    };
}

/// Log an error through the engine logger and return it from the current function
///
/// # Example
///
/// ```no_run
/// # use stagebind_engine::engine_bail;
/// fn check(count: u32) -> stagebind_engine::stagebind::Result<()> {
///     if count == 0 {
///         engine_bail!("stagebind::Shader", "Bind count must be at least 1");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    (@$variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!(@$variant, $source, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
