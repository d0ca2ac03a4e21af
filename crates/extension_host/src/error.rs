//! Error types for the extension host

use std::path::PathBuf;

/// Main error type for module and plugin lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Bootstrap was invoked a second time on the same instance
    #[error("Extension host is already initialized")]
    AlreadyInitialized,

    /// A declared dependency is not registered yet
    #[error("Module '{module}' depends on '{dependency}', which is not loaded")]
    DependencyNotLoaded { module: String, dependency: String },

    /// Declared dependencies form a cycle
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Other loaded modules still depend on the module being unloaded
    #[error("Module '{module}' is still required by: {}", .dependents.join(", "))]
    ModuleInUse { module: String, dependents: Vec<String> },

    /// Module id is not registered
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// Command id is not registered
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Plugin directory has no manifest file
    #[error("Plugin manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// Manifest could not be parsed or is incomplete
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Resolved entry point does not exist on disk
    #[error("Plugin entry point not found: {}", .0.display())]
    EntryPointMissing(PathBuf),

    /// Dynamic load of an entry point failed
    #[error("Plugin loading failed: {0}")]
    LoadingFailed(String),

    /// Shared library could not be opened or a symbol is missing
    #[error("Library loading error: {0}")]
    LibraryError(String),

    /// Host and plugin ABI versions are incompatible
    #[error("Version mismatch: {0}")]
    VersionMismatch(String),

    /// No export of the loaded entry satisfies the plugin contract
    #[error("Plugin '{plugin}' has no valid plugin export (exports: {})", .exports.join(", "))]
    ValidationFailed { plugin: String, exports: Vec<String> },

    /// A plugin's own install/uninstall hook failed
    #[error("Plugin error: {0}")]
    PluginFailed(String),

    /// Event bus error
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors that can occur during event handling
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Handler execution failed
    #[error("Handler execution failed: {0}")]
    HandlerExecutionFailed(String),

    /// Event serialization failed
    #[error("Event serialization failed: {0}")]
    SerializationFailed(String),

    /// Event deserialization failed
    #[error("Event deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Invalid topic name
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::SerializationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Serialization(err.to_string())
    }
}

/// Result type used throughout the host
pub type HostResult<T> = std::result::Result<T, HostError>;
