//! One-shot assembly of the capability context and both loaders

use crate::context::CapabilityContext;
use crate::discovery::{DiscoveryReport, PluginLoader};
use crate::entry::{CompositeEntryLoader, EntryLoader};
use crate::error::{HostError, HostResult};
use crate::manifest::PluginLoaderConfig;
use crate::module_loader::ModuleLoader;
use crate::native::NativeEntryLoader;
use crate::plugin::EditorPluginManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Inputs to [`Bootstrap::initialize`]
#[derive(Default)]
pub struct BootstrapOptions {
    /// Application root; plugins are discovered below it
    pub root: PathBuf,
    pub plugin_config: PluginLoaderConfig,
    /// Defaults to the native loader for shared-library entries
    pub entry_loader: Option<Arc<dyn EntryLoader>>,
    /// Defaults to a context with headless services
    pub context: Option<CapabilityContext>,
}

impl BootstrapOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_plugin_config(mut self, config: PluginLoaderConfig) -> Self {
        self.plugin_config = config;
        self
    }

    pub fn with_entry_loader(mut self, loader: Arc<dyn EntryLoader>) -> Self {
        self.entry_loader = Some(loader);
        self
    }

    pub fn with_context(mut self, context: CapabilityContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Everything a running host needs
#[derive(Clone)]
pub struct AppContext {
    pub context: CapabilityContext,
    pub modules: Arc<ModuleLoader>,
    pub plugins: Arc<PluginLoader>,
    pub plugin_manager: Arc<EditorPluginManager>,
    pub root: PathBuf,
}

impl AppContext {
    /// Discover and install the plugins below the application root
    pub async fn load_project_plugins(&self) -> HostResult<DiscoveryReport> {
        self.plugins
            .load_project_plugins(&self.root, self.plugin_manager.as_ref())
            .await
    }

    /// Uninstall plugins, then unload modules dependents first
    pub async fn shutdown(&self) {
        let plugins = self.plugins.unload_project_plugins(self.plugin_manager.as_ref()).await;
        let modules = self.modules.unload_all().await;
        info!(
            "Extension host shut down: {} plugin(s) uninstalled, {} module(s) unloaded",
            plugins.len(),
            modules.len()
        );
    }
}

/// Single-use initializer
#[derive(Default)]
pub struct Bootstrap {
    initialized: AtomicBool,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Build the application context. A second call fails with [`HostError::AlreadyInitialized`].
    pub fn initialize(&self, options: BootstrapOptions) -> HostResult<AppContext> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HostError::AlreadyInitialized);
        }

        let context = options
            .context
            .unwrap_or_else(|| CapabilityContext::builder().build());
        let entry_loader = options
            .entry_loader
            .unwrap_or_else(|| default_entry_loader(&options.plugin_config));

        let modules = Arc::new(ModuleLoader::new());
        let plugins = Arc::new(PluginLoader::new(options.plugin_config, entry_loader));
        let plugin_manager = Arc::new(EditorPluginManager::new(context.clone()));

        info!("Extension host initialized at {}", options.root.display());

        Ok(AppContext {
            context,
            modules,
            plugins,
            plugin_manager,
            root: options.root,
        })
    }
}

/// Entry loader used when none is supplied: shared libraries only
pub fn default_entry_loader(config: &PluginLoaderConfig) -> Arc<dyn EntryLoader> {
    let native: Arc<dyn EntryLoader> = Arc::new(NativeEntryLoader::new(config.native.clone()));
    Arc::new(CompositeEntryLoader::new().with_loader(&["so", "dylib", "dll"], native))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StaticEntryLoader;
    use crate::module::Module;
    use crate::panel::PanelDescriptor;
    use crate::plugin::tests::plugin_export;
    use crate::plugin::LoadedEntry;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct LayoutModule;

    #[async_trait]
    impl Module for LayoutModule {
        fn id(&self) -> &str {
            "layout"
        }

        fn name(&self) -> &str {
            "Layout"
        }

        async fn load(&self, context: &CapabilityContext) -> HostResult<()> {
            context.panels().register(PanelDescriptor::new("scene", "Scene", "SceneTree"));
            Ok(())
        }
    }

    #[test]
    fn test_second_initialize_fails() {
        let bootstrap = Bootstrap::new();
        assert!(bootstrap.initialize(BootstrapOptions::new("/tmp/project")).is_ok());
        assert!(bootstrap.is_initialized());
        assert!(matches!(
            bootstrap.initialize(BootstrapOptions::new("/tmp/project")),
            Err(HostError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let temp = TempDir::new().unwrap();
        let plugin_dir = temp.path().join("plugins/demo/src");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("index.ts"), "").unwrap();
        std::fs::write(
            temp.path().join("plugins/demo/package.json"),
            r#"{"name": "demo", "version": "1.0.0"}"#,
        )
        .unwrap();

        let entries = Arc::new(StaticEntryLoader::new());
        entries.insert(
            "demo",
            "src/index.ts",
            LoadedEntry::default().with_default(plugin_export("demo", Arc::new(AtomicUsize::new(0)))),
        );

        let app = Bootstrap::new()
            .initialize(BootstrapOptions::new(temp.path()).with_entry_loader(entries))
            .unwrap();

        app.modules.load_module(Arc::new(LayoutModule), &app.context).await.unwrap();
        assert!(app.context.panels().has("scene"));

        let report = app.load_project_plugins().await.unwrap();
        assert_eq!(report.installed, vec!["demo"]);
        assert!(app.plugin_manager.is_installed("demo"));

        app.shutdown().await;
        assert!(app.plugin_manager.is_empty());
        assert_eq!(app.modules.module_count().await, 0);
    }
}
