//! Plugin discovery from a project's plugins directory.
//!
//! Each immediate, non-hidden subdirectory of `<root>/<plugins_dir>` is a
//! plugin candidate containing a manifest. Candidates are processed one at a
//! time in directory-name order; a failing candidate is logged and skipped
//! without affecting the others.

use crate::entry::{EntryLoader, ModuleSpecifier};
use crate::error::{HostError, HostResult};
use crate::manifest::{resolve_entry_point, PluginLoaderConfig, PluginManifest};
use crate::plugin::{validate_exports, PluginManager};
use crate::utils::is_hidden;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Result of loading one candidate that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// Installed under the plugin's own name, taken from export `export`
    Installed { name: String, export: String },
    /// Directory has no manifest
    NoManifest,
    /// A plugin with the same declared name is already loaded
    Duplicate(String),
}

/// A candidate that was not installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlugin {
    pub directory: String,
    pub reason: String,
}

/// Summary of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Names of installed plugins, in processing order
    pub installed: Vec<String>,
    pub skipped: Vec<SkippedPlugin>,
}

pub struct PluginLoader {
    config: PluginLoaderConfig,
    entry_loader: Arc<dyn EntryLoader>,
    /// Declared manifest name -> name the plugin was installed under
    loaded: DashMap<String, String>,
    lifecycle: Mutex<()>,
}

impl PluginLoader {
    pub fn new(config: PluginLoaderConfig, entry_loader: Arc<dyn EntryLoader>) -> Self {
        Self {
            config,
            entry_loader,
            loaded: DashMap::new(),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PluginLoaderConfig {
        &self.config
    }

    /// Discover and install every plugin below `root`.
    ///
    /// A missing plugins directory is not an error.
    pub async fn load_project_plugins(
        &self,
        root: &Path,
        manager: &dyn PluginManager,
    ) -> HostResult<DiscoveryReport> {
        let _lifecycle = self.lifecycle.lock().await;
        let plugins_dir = root.join(&self.config.plugins_dir);
        let mut report = DiscoveryReport::default();

        match tokio::fs::metadata(&plugins_dir).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(HostError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Plugin path is not a directory: {}", plugins_dir.display()),
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No plugins directory at {}, skipping discovery", plugins_dir.display());
                return Ok(report);
            }
            Err(e) => {
                error!("Cannot read plugins directory {}: {}", plugins_dir.display(), e);
                return Err(e.into());
            }
        }

        let candidates = list_candidates(&plugins_dir).await?;
        info!("Found {} plugin candidate(s) in {}", candidates.len(), plugins_dir.display());

        for (dir_name, path) in candidates {
            match self.load_locked(&path, &dir_name, manager).await {
                Ok(PluginOutcome::Installed { name, .. }) => report.installed.push(name),
                Ok(PluginOutcome::NoManifest) => {
                    warn!("Skipping plugin '{}': no {}", dir_name, self.config.manifest_file);
                    report.skipped.push(SkippedPlugin {
                        directory: dir_name,
                        reason: format!("missing {}", self.config.manifest_file),
                    });
                }
                Ok(PluginOutcome::Duplicate(name)) => {
                    warn!("Skipping plugin '{}': '{}' is already loaded", dir_name, name);
                    report.skipped.push(SkippedPlugin {
                        directory: dir_name,
                        reason: format!("plugin '{}' already loaded", name),
                    });
                }
                Err(e) => {
                    warn!("Skipping plugin '{}': {}", dir_name, e);
                    report.skipped.push(SkippedPlugin {
                        directory: dir_name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Plugin discovery complete: {} installed, {} skipped",
            report.installed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Load a single plugin directory
    pub async fn load_plugin(
        &self,
        plugin_path: &Path,
        dir_name: &str,
        manager: &dyn PluginManager,
    ) -> HostResult<PluginOutcome> {
        let _lifecycle = self.lifecycle.lock().await;
        self.load_locked(plugin_path, dir_name, manager).await
    }

    /// Uninstall every plugin this loader installed and forget them.
    ///
    /// Returns the names that uninstalled cleanly.
    pub async fn unload_project_plugins(&self, manager: &dyn PluginManager) -> Vec<String> {
        let _lifecycle = self.lifecycle.lock().await;

        let mut installed: Vec<String> = self.loaded.iter().map(|entry| entry.value().clone()).collect();
        installed.sort();

        let mut uninstalled = Vec::new();
        for name in installed {
            match manager.uninstall_editor(&name).await {
                Ok(()) => uninstalled.push(name),
                Err(e) => error!("Failed to uninstall plugin {}: {}", name, e),
            }
        }

        self.loaded.clear();
        uninstalled
    }

    /// Declared names of loaded plugins, sorted
    pub fn loaded_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    async fn load_locked(
        &self,
        plugin_path: &Path,
        dir_name: &str,
        manager: &dyn PluginManager,
    ) -> HostResult<PluginOutcome> {
        let manifest_path = plugin_path.join(&self.config.manifest_file);
        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Ok(PluginOutcome::NoManifest);
        }

        let manifest = PluginManifest::from_file(&manifest_path).await?;
        if self.loaded.contains_key(&manifest.name) {
            return Ok(PluginOutcome::Duplicate(manifest.name));
        }

        let entry = resolve_entry_point(&manifest, plugin_path, &self.config);
        debug!(
            "Plugin {} entry resolved to {} ({:?})",
            manifest.name, entry.path, entry.source
        );

        let specifier = ModuleSpecifier::new(plugin_path, dir_name, entry.path);
        let exports = self.entry_loader.load(&specifier).await?;

        let Some((export, plugin)) = validate_exports(&exports) else {
            let names = exports.export_names();
            error!(
                "No export of {} matches the plugin shape; exports: [{}]",
                specifier,
                names.join(", ")
            );
            return Err(HostError::ValidationFailed {
                plugin: manifest.name,
                exports: names,
            });
        };

        let name = plugin.name().to_string();
        if name != manifest.name {
            debug!("Plugin {} declares itself as {}", manifest.name, name);
        }

        manager.install_editor(plugin).await?;
        self.loaded.insert(manifest.name.clone(), name.clone());

        info!("Loaded plugin {} v{} from {}", manifest.display_name(), manifest.version, specifier);
        Ok(PluginOutcome::Installed { name, export })
    }
}

/// Non-hidden subdirectories, sorted by name
async fn list_candidates(plugins_dir: &Path) -> HostResult<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(plugins_dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) {
            debug!("Ignoring hidden directory {}", name);
            continue;
        }
        // metadata follows symlinks, so linked plugin folders count as directories
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => candidates.push((name, path)),
            Ok(_) => debug!("Ignoring non-directory entry {}", name),
            Err(e) => warn!("Ignoring unreadable plugin entry {}: {}", name, e),
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(candidates)
}
