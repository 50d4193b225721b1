//! Espresso Sandbox - WebAssembly job isolation
//!
//! Every job runs a WASI preview-1 command against its own read-only input
//! directory, with stdout and stderr captured into bounded memory pipes.
//! No network. Nothing survives the job except its output.

mod cache;
mod runtime;
mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vfs;

pub use cache::ModuleCache;
pub use runtime::{
    Completion, Initializer, Runtime, RuntimeEnvironment, SandboxConfig, ENTRY_POINT,
};
pub use source::{FileSource, HttpSource, InMemorySource, ModuleSource, RoutedSource};
pub use vfs::{VirtualFs, DEFAULT_OUTPUT_LIMIT, INPUT_PATH};

/// Broad failure classes, stable across the concrete error variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The execution engine could not start; fatal for the worker
    Setup,
    /// The module could not be fetched or compiled
    Resolution,
    /// The module failed to instantiate, trapped, or crashed its run
    Execution,
    /// The job request itself was unusable
    Protocol,
}

/// Errors from sandbox operations
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Runtime initialization failed: {0}")]
    Setup(String),

    #[error("Failed to fetch module '{module_ref}': {reason}")]
    Fetch { module_ref: String, reason: String },

    #[error("Failed to compile module '{module_ref}': {reason}")]
    Compile { module_ref: String, reason: String },

    #[error("Failed to instantiate module: {0}")]
    Instantiation(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl SandboxError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SandboxError::Setup(_) => FailureKind::Setup,
            SandboxError::Fetch { .. } | SandboxError::Compile { .. } => FailureKind::Resolution,
            SandboxError::Instantiation(_) | SandboxError::Execution(_) => FailureKind::Execution,
        }
    }

    pub(crate) fn fetch(module_ref: &str, reason: impl ToString) -> Self {
        SandboxError::Fetch {
            module_ref: module_ref.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
