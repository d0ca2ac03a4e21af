//! Module trait definitions and registry entries

use crate::context::CapabilityContext;
use crate::error::{HostError, HostResult};
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// An internal feature unit with declared dependencies and lifecycle hooks
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique identifier used for dependency references
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Ids of modules that must be loaded before this one
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Called once when the module enters the registry
    async fn load(&self, context: &CapabilityContext) -> HostResult<()>;

    /// Called when the module leaves the registry. Failures are logged only.
    async fn unload(&self) -> HostResult<()> {
        Ok(())
    }

    /// Whether [`Module::reload`] should be used instead of unload + load
    fn reloads_in_place(&self) -> bool {
        false
    }

    /// In-place reload; only called when [`Module::reloads_in_place`] is true
    async fn reload(&self, _context: &CapabilityContext) -> HostResult<()> {
        Ok(())
    }
}

/// A registered module with its bookkeeping
#[derive(Clone)]
pub struct ModuleEntry {
    pub module: Arc<dyn Module>,
    pub loaded: bool,
    /// Unix timestamp in milliseconds of the last successful load
    pub loaded_at: u64,
}

impl ModuleEntry {
    pub fn id(&self) -> &str {
        self.module.id()
    }
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("id", &self.module.id())
            .field("name", &self.module.name())
            .field("dependencies", &self.module.dependencies())
            .field("loaded", &self.loaded)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Helper to convert panics to HostError
pub(crate) fn panic_to_error(label: &str, panic_info: Box<dyn std::any::Any + Send>) -> HostError {
    let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
        format!("{} panicked: {}", label, s)
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        format!("{} panicked: {}", label, s)
    } else {
        format!("{} panicked with unknown error", label)
    };

    HostError::PluginFailed(message)
}

/// Run a lifecycle hook, turning a panic into an error instead of unwinding into the host
pub(crate) async fn guarded<F>(label: &str, hook: F) -> HostResult<()>
where
    F: Future<Output = HostResult<()>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => Err(panic_to_error(label, panic_info)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_passes_results_through() {
        assert!(guarded("ok", async { Ok(()) }).await.is_ok());
        let err = guarded("err", async { Err(HostError::ModuleNotFound("x".into())) }).await;
        assert!(matches!(err, Err(HostError::ModuleNotFound(_))));
    }

    #[tokio::test]
    async fn test_guarded_catches_panics() {
        async fn explode() -> HostResult<()> {
            panic!("exploded")
        }

        let result = guarded("module 'boom' load", explode()).await;

        match result {
            Err(HostError::PluginFailed(message)) => {
                assert!(message.contains("module 'boom' load panicked: exploded"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
