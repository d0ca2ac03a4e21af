//! Plugin manifest parsing and entry-point resolution
//!
//! Each plugin directory carries a JSON manifest (`package.json` by default)
//! with a `name`, a `version`, and any of three entry-point declarations:
//! an `exports` map, a `module` field and a `main` field.
//!
//! Resolution walks a fixed precedence chain and the first candidate that
//! exists on disk wins:
//!
//! 1. the development condition of the export map,
//! 2. the import target of the export map,
//! 3. the `module` field,
//! 4. the `main` field,
//! 5. the configured default entry.
//!
//! For steps 2 to 4 a declared build path (`dist/index.js`) is first mapped to
//! its source equivalent (`src/index.ts`); the declared path is only used when
//! that source file is absent.

use crate::error::{HostError, HostResult};
use crate::native::NativeLoaderConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Plugin manifest structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique plugin name, used for deduplication.
    pub name: String,

    /// Version string (semver).
    pub version: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Export map, either a bare path or a map of subpaths / conditions.
    #[serde(default)]
    pub exports: Option<ExportTarget>,

    /// ES-module entry.
    #[serde(default)]
    pub module: Option<String>,

    /// Generic entry.
    #[serde(default)]
    pub main: Option<String>,
}

/// A node of an export map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportTarget {
    Path(String),
    /// Ordered fallbacks; the first resolvable one is used
    Fallbacks(Vec<ExportTarget>),
    /// Subpath keys (`"."`, `"./utils"`) or condition names (`import`, `development`)
    Map(HashMap<String, ExportTarget>),
}

impl ExportTarget {
    /// The target for the package root: `"."` of a subpath map, or the whole node
    fn root(&self) -> Option<&ExportTarget> {
        match self {
            ExportTarget::Map(map) if map.keys().any(|k| k.starts_with('.')) => map.get("."),
            other => Some(other),
        }
    }

    /// Path under `condition`, searched through nested condition maps
    fn condition(&self, condition: &str) -> Option<&str> {
        match self {
            ExportTarget::Path(_) => None,
            ExportTarget::Fallbacks(items) => items.iter().find_map(|item| item.condition(condition)),
            ExportTarget::Map(map) => {
                if let Some(target) = map.get(condition) {
                    return target.first_path(condition);
                }
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter().find_map(|key| map[key].condition(condition))
            }
        }
    }

    /// Path for a plain import, ignoring `skip` (the development condition)
    fn import_path(&self, skip: &str) -> Option<&str> {
        match self {
            ExportTarget::Path(path) => Some(path),
            ExportTarget::Fallbacks(items) => items.iter().find_map(|item| item.import_path(skip)),
            ExportTarget::Map(map) => ["import", "default", "require"]
                .iter()
                .filter(|key| **key != skip)
                .find_map(|key| map.get(*key).and_then(|target| target.import_path(skip))),
        }
    }

    fn first_path(&self, skip: &str) -> Option<&str> {
        match self {
            ExportTarget::Path(path) => Some(path),
            other => other.import_path(skip),
        }
    }
}

impl PluginManifest {
    /// Parse a manifest from JSON text
    pub fn from_json(content: &str) -> HostResult<Self> {
        let manifest: Self =
            serde_json::from_str(content).map_err(|e| HostError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and parse a manifest file
    pub async fn from_file(path: &Path) -> HostResult<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(HostError::ManifestMissing(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    fn validate(&self) -> HostResult<()> {
        if self.name.trim().is_empty() {
            return Err(HostError::InvalidManifest("name cannot be empty".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(HostError::InvalidManifest(format!(
                "plugin '{}' has an empty version",
                self.name
            )));
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Configuration of the plugin discovery layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginLoaderConfig {
    /// Name of the plugins directory below the project root
    pub plugins_dir: String,
    /// Manifest file name inside each plugin directory
    pub manifest_file: String,
    /// Directory holding plugin sources
    pub source_dir: String,
    /// Directories holding build output, mapped back to `source_dir`
    pub build_dirs: Vec<String>,
    /// Build extension to source extension
    pub source_extensions: BTreeMap<String, String>,
    /// Entry used when the manifest declares none
    pub default_entry: String,
    /// Export-map condition naming the development source
    pub dev_condition: String,
    /// Resolve development sources ahead of declared build paths
    pub prefer_source: bool,
    /// Shared-library entry points
    pub native: NativeLoaderConfig,
}

impl Default for PluginLoaderConfig {
    fn default() -> Self {
        let source_extensions = [("js", "ts"), ("mjs", "mts"), ("cjs", "cts"), ("jsx", "tsx")]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();

        Self {
            plugins_dir: "plugins".to_string(),
            manifest_file: "package.json".to_string(),
            source_dir: "src".to_string(),
            build_dirs: vec!["dist".to_string(), "lib".to_string(), "build".to_string()],
            source_extensions,
            default_entry: "src/index.ts".to_string(),
            dev_condition: "development".to_string(),
            prefer_source: true,
            native: NativeLoaderConfig::default(),
        }
    }
}

/// Which manifest declaration an entry point came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    DevelopmentExport,
    ImportExport,
    ModuleField,
    MainField,
    Default,
}

/// An entry point relative to its plugin directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub path: String,
    pub source: EntrySource,
}

/// Resolve the entry point of a plugin. See the module docs for the precedence.
pub fn resolve_entry_point(
    manifest: &PluginManifest,
    plugin_dir: &Path,
    config: &PluginLoaderConfig,
) -> ResolvedEntry {
    let exists = |relative: &str| plugin_dir.join(relative).is_file();
    let root_export = manifest.exports.as_ref().and_then(ExportTarget::root);

    if config.prefer_source {
        if let Some(dev) = root_export.and_then(|e| e.condition(&config.dev_condition)) {
            let dev = normalize(dev);
            if exists(&dev) {
                return ResolvedEntry { path: dev, source: EntrySource::DevelopmentExport };
            }
        }
    }

    let declared = [
        (root_export.and_then(|e| e.import_path(&config.dev_condition)), EntrySource::ImportExport),
        (manifest.module.as_deref(), EntrySource::ModuleField),
        (manifest.main.as_deref(), EntrySource::MainField),
    ];

    for (path, source) in declared {
        let Some(path) = path else { continue };
        let path = normalize(path);

        if config.prefer_source && !is_source_path(&path, config) {
            if let Some(candidate) = derive_source_path(&path, config) {
                if exists(&candidate) {
                    debug!(
                        "Plugin {}: using source {} instead of declared {}",
                        manifest.name, candidate, path
                    );
                    return ResolvedEntry { path: candidate, source };
                }
            }
        }

        if exists(&path) {
            return ResolvedEntry { path, source };
        }
    }

    ResolvedEntry {
        path: normalize(&config.default_entry),
        source: EntrySource::Default,
    }
}

/// Strip leading `./` markers
fn normalize(path: &str) -> String {
    let mut path = path.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.to_string()
}

fn is_source_path(path: &str, config: &PluginLoaderConfig) -> bool {
    let in_source_dir = path
        .split('/')
        .next()
        .map(|first| first == config.source_dir)
        .unwrap_or(false);
    let source_ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.source_extensions.values().any(|s| s == ext))
        .unwrap_or(false);
    in_source_dir || source_ext
}

/// Map `dist/index.js` to `src/index.ts`; `None` if nothing would change
pub fn derive_source_path(path: &str, config: &PluginLoaderConfig) -> Option<String> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if let Some(first) = segments.first_mut() {
        if config.build_dirs.iter().any(|dir| dir == first) {
            *first = config.source_dir.as_str();
        }
    }
    let mut derived = PathBuf::from(segments.join("/"));

    if let Some(ext) = derived.extension().and_then(|e| e.to_str()).map(str::to_string) {
        if let Some(mapped) = config.source_extensions.get(&ext) {
            derived.set_extension(mapped);
        }
    }

    let derived = derived.to_string_lossy().replace('\\', "/");
    (derived != path).then_some(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    fn manifest(json: &str) -> PluginManifest {
        PluginManifest::from_json(json).unwrap()
    }

    #[test]
    fn test_parse_manifest() {
        let m = manifest(
            r#"{
                "name": "demo",
                "version": "1.0.0",
                "displayName": "Demo Plugin",
                "exports": { ".": { "import": "./dist/index.js" } },
                "main": "dist/index.cjs"
            }"#,
        );
        assert_eq!(m.name, "demo");
        assert_eq!(m.display_name(), "Demo Plugin");
        assert!(matches!(m.exports, Some(ExportTarget::Map(_))));
    }

    #[test]
    fn test_reject_incomplete_manifest() {
        assert!(matches!(
            PluginManifest::from_json(r#"{"name": "", "version": "1.0.0"}"#),
            Err(HostError::InvalidManifest(_))
        ));
        assert!(matches!(
            PluginManifest::from_json(r#"{"name": "demo"}"#),
            Err(HostError::InvalidManifest(_))
        ));
        assert!(PluginManifest::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_manifest_file() {
        let temp = TempDir::new().unwrap();
        let result = PluginManifest::from_file(&temp.path().join("package.json")).await;
        assert!(matches!(result, Err(HostError::ManifestMissing(_))));
    }

    #[test]
    fn test_import_export_prefers_source_sibling() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "dist/index.js");
        touch(temp.path(), "src/index.ts");

        let m = manifest(
            r#"{"name": "demo", "version": "1.0.0", "exports": {".": {"import": "dist/index.js"}}}"#,
        );
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "src/index.ts");
        assert_eq!(entry.source, EntrySource::ImportExport);
    }

    #[test]
    fn test_declared_path_used_without_source() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "dist/index.js");

        let m = manifest(
            r#"{"name": "demo", "version": "1.0.0", "exports": {".": {"import": "./dist/index.js"}}}"#,
        );
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "dist/index.js");
    }

    #[test]
    fn test_development_condition_wins() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/dev.ts");
        touch(temp.path(), "src/index.ts");

        let m = manifest(
            r#"{
                "name": "demo",
                "version": "1.0.0",
                "exports": {".": {"import": {"development": "./src/dev.ts", "default": "./dist/index.js"}}}
            }"#,
        );
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "src/dev.ts");
        assert_eq!(entry.source, EntrySource::DevelopmentExport);

        let config = PluginLoaderConfig { prefer_source: false, ..Default::default() };
        // dist does not exist either, so resolution falls through to the default
        let entry = resolve_entry_point(&m, temp.path(), &config);
        assert_eq!(entry.source, EntrySource::Default);
    }

    #[test]
    fn test_string_shorthand_export() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "lib/main.mjs");

        let m = manifest(r#"{"name": "demo", "version": "1.0.0", "exports": "./lib/main.mjs"}"#);
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "lib/main.mjs");
        assert_eq!(entry.source, EntrySource::ImportExport);
    }

    #[test]
    fn test_module_then_main_then_default() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "build/main.js");

        let m = manifest(
            r#"{"name": "demo", "version": "1.0.0", "module": "build/esm.js", "main": "build/main.js"}"#,
        );
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "build/main.js");
        assert_eq!(entry.source, EntrySource::MainField);

        touch(temp.path(), "src/esm.ts");
        let entry = resolve_entry_point(&m, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "src/esm.ts");
        assert_eq!(entry.source, EntrySource::ModuleField);

        let bare = manifest(r#"{"name": "demo", "version": "1.0.0"}"#);
        let entry = resolve_entry_point(&bare, temp.path(), &PluginLoaderConfig::default());
        assert_eq!(entry.path, "src/index.ts");
        assert_eq!(entry.source, EntrySource::Default);
    }

    #[test]
    fn test_derive_source_path() {
        let config = PluginLoaderConfig::default();
        assert_eq!(derive_source_path("dist/index.js", &config).as_deref(), Some("src/index.ts"));
        assert_eq!(derive_source_path("lib/ui/panel.jsx", &config).as_deref(), Some("src/ui/panel.tsx"));
        assert_eq!(derive_source_path("index.cjs", &config).as_deref(), Some("index.cts"));
        assert_eq!(derive_source_path("libplugin.so", &config), None);
    }
}
