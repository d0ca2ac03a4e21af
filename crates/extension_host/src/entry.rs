//! Entry-point loading seam
//!
//! Discovery resolves an entry path and hands it to an [`EntryLoader`] as a
//! [`ModuleSpecifier`]. What "loading" means depends on the loader: shared
//! libraries go through [`crate::native::NativeEntryLoader`], statically linked
//! plugins through [`StaticEntryLoader`].

use crate::error::{HostError, HostResult};
use crate::plugin::LoadedEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A resolved entry point scoped to its plugin directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpecifier {
    /// Plugin directory name
    pub scope: String,
    /// Entry path relative to the plugin directory, `/`-separated
    pub entry: String,
    /// Absolute path on disk
    pub path: PathBuf,
}

impl ModuleSpecifier {
    pub fn new(plugin_dir: &Path, scope: impl Into<String>, entry: impl Into<String>) -> Self {
        let entry = entry.into();
        Self {
            scope: scope.into(),
            path: plugin_dir.join(&entry),
            entry,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

impl std::fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugin://{}/{}", self.scope, self.entry)
    }
}

/// Turns an entry point into its exports
#[async_trait]
pub trait EntryLoader: Send + Sync {
    async fn load(&self, specifier: &ModuleSpecifier) -> HostResult<LoadedEntry>;
}

/// Serves exports registered in memory, keyed by specifier URL
///
/// Used for plugins compiled into the host and in tests. The entry file must
/// still exist on disk; only its contents are ignored.
#[derive(Default)]
pub struct StaticEntryLoader {
    entries: DashMap<String, LoadedEntry>,
}

impl StaticEntryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register exports for `plugin://<scope>/<entry>`
    pub fn insert(&self, scope: &str, entry: &str, exports: LoadedEntry) {
        self.entries.insert(format!("plugin://{}/{}", scope, entry), exports);
    }
}

#[async_trait]
impl EntryLoader for StaticEntryLoader {
    async fn load(&self, specifier: &ModuleSpecifier) -> HostResult<LoadedEntry> {
        if !tokio::fs::try_exists(&specifier.path).await.unwrap_or(false) {
            return Err(HostError::EntryPointMissing(specifier.path.clone()));
        }

        self.entries
            .get(&specifier.to_string())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::LoadingFailed(format!("nothing registered for {}", specifier)))
    }
}

/// Dispatches to a loader by entry file extension
#[derive(Default)]
pub struct CompositeEntryLoader {
    by_extension: HashMap<String, Arc<dyn EntryLoader>>,
    fallback: Option<Arc<dyn EntryLoader>>,
}

impl CompositeEntryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, extensions: &[&str], loader: Arc<dyn EntryLoader>) -> Self {
        for ext in extensions {
            self.by_extension.insert(ext.to_ascii_lowercase(), loader.clone());
        }
        self
    }

    /// Loader for extensions with no dedicated loader
    pub fn with_fallback(mut self, loader: Arc<dyn EntryLoader>) -> Self {
        self.fallback = Some(loader);
        self
    }
}

#[async_trait]
impl EntryLoader for CompositeEntryLoader {
    async fn load(&self, specifier: &ModuleSpecifier) -> HostResult<LoadedEntry> {
        let ext = specifier.extension().map(str::to_ascii_lowercase).unwrap_or_default();
        let loader = self
            .by_extension
            .get(&ext)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                HostError::LoadingFailed(format!("no loader for '.{}' entries ({})", ext, specifier))
            })?;

        debug!("Loading {} via .{} loader", specifier, ext);
        loader.load(specifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{ExportObject, ExportValue};
    use tempfile::TempDir;

    #[test]
    fn test_specifier_display() {
        let spec = ModuleSpecifier::new(Path::new("/project/plugins/demo"), "demo", "src/index.ts");
        assert_eq!(spec.to_string(), "plugin://demo/src/index.ts");
        assert_eq!(spec.path, PathBuf::from("/project/plugins/demo/src/index.ts"));
        assert_eq!(spec.extension(), Some("ts"));
    }

    #[tokio::test]
    async fn test_static_loader_requires_file() {
        let temp = TempDir::new().unwrap();
        let loader = StaticEntryLoader::new();
        loader.insert("demo", "index.ts", LoadedEntry::default());

        let spec = ModuleSpecifier::new(temp.path(), "demo", "index.ts");
        assert!(matches!(loader.load(&spec).await, Err(HostError::EntryPointMissing(_))));

        std::fs::write(temp.path().join("index.ts"), "").unwrap();
        assert!(loader.load(&spec).await.is_ok());
    }

    #[tokio::test]
    async fn test_composite_dispatch() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.ts"), "").unwrap();
        std::fs::write(temp.path().join("index.wasm"), "").unwrap();

        let scripts = Arc::new(StaticEntryLoader::new());
        scripts.insert(
            "demo",
            "index.ts",
            LoadedEntry::default().with_named("marker", ExportObject::new().with_value("kind", "script")),
        );

        let composite = CompositeEntryLoader::new().with_loader(&["ts", "TSX"], scripts);

        let entry = composite
            .load(&ModuleSpecifier::new(temp.path(), "demo", "index.ts"))
            .await
            .unwrap();
        match &entry.named[0].1 {
            ExportValue::Object(object) => assert_eq!(object.string("kind"), Some("script")),
            other => panic!("unexpected export: {:?}", other),
        }

        let unknown = composite
            .load(&ModuleSpecifier::new(temp.path(), "demo", "index.wasm"))
            .await;
        assert!(matches!(unknown, Err(HostError::LoadingFailed(_))));
    }
}
