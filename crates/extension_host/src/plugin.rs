//! Dynamic plugin exports, structural validation and the plugin manager
//!
//! Loaded plugin code is not typed against a Rust trait. An entry point
//! yields a set of exports, each a dynamic [`ExportValue`]; an export is
//! accepted as a plugin only if it has the right shape:
//!
//! - string properties `name`, `version`, `displayName`, `category`
//! - callable properties `install`, `uninstall`
//!
//! The default export is checked first, then named exports in declaration order.

use crate::context::CapabilityContext;
use crate::error::{HostError, HostResult};
use crate::module::guarded;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A callable property of an export
#[derive(Clone)]
pub struct PluginMethod(Arc<dyn Fn() -> BoxFuture<'static, HostResult<()>> + Send + Sync>);

impl PluginMethod {
    pub fn new<F, Fut>(method: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HostResult<()>> + Send + 'static,
    {
        Self(Arc::new(move || method().boxed()))
    }

    /// Wrap a synchronous function
    pub fn from_fn<F>(method: F) -> Self
    where
        F: Fn() -> HostResult<()> + Send + Sync + 'static,
    {
        let method = Arc::new(method);
        Self(Arc::new(move || {
            let method = method.clone();
            async move { method() }.boxed()
        }))
    }

    pub async fn call(&self) -> HostResult<()> {
        (self.0)().await
    }
}

impl std::fmt::Debug for PluginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PluginMethod")
    }
}

#[derive(Debug, Clone)]
pub enum Property {
    Value(Value),
    Method(PluginMethod),
}

/// An object export: properties in declaration order
#[derive(Debug, Clone, Default)]
pub struct ExportObject {
    properties: Vec<(String, Property)>,
}

impl ExportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, Property::Value(value.into()));
        self
    }

    pub fn with_method(mut self, key: impl Into<String>, method: PluginMethod) -> Self {
        self.set(key, Property::Method(method));
        self
    }

    /// Set a property, replacing an existing one of the same key in place
    pub fn set(&mut self, key: impl Into<String>, property: Property) {
        let key = key.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = property,
            None => self.properties.push((key, property)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, p)| p)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Property::Value(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    pub fn method(&self, key: &str) -> Option<&PluginMethod> {
        match self.get(key) {
            Some(Property::Method(m)) => Some(m),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(k, _)| k.as_str())
    }
}

/// A single export of a loaded entry point
#[derive(Debug, Clone)]
pub enum ExportValue {
    Value(Value),
    Object(ExportObject),
}

impl From<ExportObject> for ExportValue {
    fn from(object: ExportObject) -> Self {
        ExportValue::Object(object)
    }
}

/// Everything an entry point exported
#[derive(Debug, Clone, Default)]
pub struct LoadedEntry {
    pub default: Option<ExportValue>,
    /// Named exports in declaration order
    pub named: Vec<(String, ExportValue)>,
}

impl LoadedEntry {
    pub fn with_default(mut self, value: impl Into<ExportValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<ExportValue>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Export names, `default` first
    pub fn export_names(&self) -> Vec<String> {
        self.default
            .as_ref()
            .map(|_| "default".to_string())
            .into_iter()
            .chain(self.named.iter().map(|(name, _)| name.clone()))
            .collect()
    }
}

/// A validated editor plugin
#[derive(Debug, Clone)]
pub struct EditorPlugin {
    name: String,
    version: String,
    display_name: String,
    category: String,
    install: PluginMethod,
    uninstall: PluginMethod,
}

impl EditorPlugin {
    /// Check an export against the plugin shape; `None` if anything is missing or mistyped
    pub fn from_export(export: &ExportValue) -> Option<Self> {
        let ExportValue::Object(object) = export else {
            return None;
        };

        Some(Self {
            name: object.string("name")?.to_string(),
            version: object.string("version")?.to_string(),
            display_name: object.string("displayName")?.to_string(),
            category: object.string("category")?.to_string(),
            install: object.method("install")?.clone(),
            uninstall: object.method("uninstall")?.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub async fn install(&self) -> HostResult<()> {
        guarded(&format!("plugin '{}' install", self.name), self.install.call()).await
    }

    pub async fn uninstall(&self) -> HostResult<()> {
        guarded(&format!("plugin '{}' uninstall", self.name), self.uninstall.call()).await
    }

    fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "displayName": self.display_name,
            "category": self.category,
        })
    }
}

/// First export matching the plugin shape, with the export's name
pub fn validate_exports(entry: &LoadedEntry) -> Option<(String, EditorPlugin)> {
    let default = entry.default.iter().map(|value| ("default", value));
    let named = entry.named.iter().map(|(name, value)| (name.as_str(), value));

    default.chain(named).find_map(|(name, value)| {
        let plugin = EditorPlugin::from_export(value);
        if plugin.is_none() {
            debug!("Export '{}' does not match the plugin shape", name);
        }
        plugin.map(|p| (name.to_string(), p))
    })
}

/// Receives validated plugins from discovery
#[async_trait]
pub trait PluginManager: Send + Sync {
    async fn install_editor(&self, plugin: EditorPlugin) -> HostResult<()>;

    async fn uninstall_editor(&self, name: &str) -> HostResult<()>;
}

/// Default plugin manager: runs the plugin's hooks and announces changes on the event bus
pub struct EditorPluginManager {
    context: CapabilityContext,
    plugins: DashMap<String, EditorPlugin>,
}

impl EditorPluginManager {
    pub const INSTALLED_TOPIC: &'static str = "plugin.installed";
    pub const UNINSTALLED_TOPIC: &'static str = "plugin.uninstalled";

    pub fn new(context: CapabilityContext) -> Self {
        Self {
            context,
            plugins: DashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<EditorPlugin> {
        self.plugins.get(name).map(|entry| entry.value().clone())
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Installed plugin names, sorted
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    async fn announce(&self, topic: &str, payload: Value) {
        if let Err(e) = self.context.event_bus().publish(topic, payload).await {
            error!("Failed to publish {}: {}", topic, e);
        }
    }
}

#[async_trait]
impl PluginManager for EditorPluginManager {
    async fn install_editor(&self, plugin: EditorPlugin) -> HostResult<()> {
        if self.plugins.contains_key(plugin.name()) {
            return Err(HostError::PluginFailed(format!(
                "plugin '{}' is already installed",
                plugin.name()
            )));
        }

        plugin.install().await?;
        info!("Installed plugin {} v{} ({})", plugin.display_name(), plugin.version(), plugin.category());

        let description = plugin.describe();
        self.plugins.insert(plugin.name().to_string(), plugin);
        self.announce(Self::INSTALLED_TOPIC, description).await;
        Ok(())
    }

    async fn uninstall_editor(&self, name: &str) -> HostResult<()> {
        let (_, plugin) = self
            .plugins
            .remove(name)
            .ok_or_else(|| HostError::PluginFailed(format!("plugin '{}' is not installed", name)))?;

        let result = plugin.uninstall().await;
        info!("Uninstalled plugin {}", name);
        self.announce(Self::UNINSTALLED_TOPIC, plugin.describe()).await;
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A well-formed plugin export counting its hook calls
    pub(crate) fn plugin_export(name: &str, installs: Arc<AtomicUsize>) -> ExportObject {
        ExportObject::new()
            .with_value("name", name)
            .with_value("version", "1.0.0")
            .with_value("displayName", format!("{} plugin", name))
            .with_value("category", "tools")
            .with_method(
                "install",
                PluginMethod::from_fn(move || {
                    installs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .with_method("uninstall", PluginMethod::from_fn(|| Ok(())))
    }

    #[test]
    fn test_shape_validation() {
        let installs = Arc::new(AtomicUsize::new(0));
        let valid = ExportValue::from(plugin_export("demo", installs));
        assert!(EditorPlugin::from_export(&valid).is_some());

        let missing_uninstall = ExportValue::from(
            ExportObject::new()
                .with_value("name", "demo")
                .with_value("version", "1.0.0")
                .with_value("displayName", "Demo")
                .with_value("category", "tools")
                .with_method("install", PluginMethod::from_fn(|| Ok(()))),
        );
        assert!(EditorPlugin::from_export(&missing_uninstall).is_none());

        let numeric_version = ExportValue::from(
            plugin_export("demo", Arc::new(AtomicUsize::new(0))).with_value("version", 1),
        );
        assert!(EditorPlugin::from_export(&numeric_version).is_none());

        assert!(EditorPlugin::from_export(&ExportValue::Value(json!("demo"))).is_none());
    }

    #[test]
    fn test_default_export_checked_first() {
        let installs = Arc::new(AtomicUsize::new(0));
        let entry = LoadedEntry::default()
            .with_default(plugin_export("from-default", installs.clone()))
            .with_named("Other", plugin_export("from-named", installs));

        let (export, plugin) = validate_exports(&entry).unwrap();
        assert_eq!(export, "default");
        assert_eq!(plugin.name(), "from-default");
    }

    #[test]
    fn test_named_exports_in_order() {
        let entry = LoadedEntry::default()
            .with_default(ExportValue::Value(json!(42)))
            .with_named("helpers", ExportObject::new().with_value("name", "helpers"))
            .with_named("First", plugin_export("first", Arc::new(AtomicUsize::new(0))))
            .with_named("Second", plugin_export("second", Arc::new(AtomicUsize::new(0))));

        let (export, plugin) = validate_exports(&entry).unwrap();
        assert_eq!(export, "First");
        assert_eq!(plugin.name(), "first");
        assert_eq!(entry.export_names(), vec!["default", "helpers", "First", "Second"]);
    }

    #[test]
    fn test_no_valid_export() {
        let entry = LoadedEntry::default().with_named("helpers", ExportValue::Value(json!({})));
        assert!(validate_exports(&entry).is_none());
    }

    #[tokio::test]
    async fn test_manager_install_and_uninstall() {
        let context = CapabilityContext::builder().build();
        let events = Arc::new(AtomicUsize::new(0));
        let counter = events.clone();
        context
            .event_bus()
            .subscribe(EditorPluginManager::INSTALLED_TOPIC, move |event| {
                assert_eq!(event.payload["name"], "demo");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        let manager = EditorPluginManager::new(context);
        let installs = Arc::new(AtomicUsize::new(0));
        let plugin = EditorPlugin::from_export(&plugin_export("demo", installs.clone()).into()).unwrap();

        manager.install_editor(plugin.clone()).await.unwrap();
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert_eq!(manager.installed(), vec!["demo"]);

        assert!(manager.install_editor(plugin).await.is_err());
        assert_eq!(installs.load(Ordering::SeqCst), 1);

        manager.uninstall_editor("demo").await.unwrap();
        assert!(manager.is_empty());
        assert!(matches!(
            manager.uninstall_editor("demo").await,
            Err(HostError::PluginFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_install_hook_panic_is_contained() {
        let manager = EditorPluginManager::new(CapabilityContext::builder().build());
        let export = plugin_export("boom", Arc::new(AtomicUsize::new(0)))
            .with_method("install", PluginMethod::from_fn(|| panic!("install exploded")));
        let plugin = EditorPlugin::from_export(&export.into()).unwrap();

        let result = manager.install_editor(plugin).await;
        assert!(matches!(result, Err(HostError::PluginFailed(msg)) if msg.contains("install exploded")));
        assert!(!manager.is_installed("boom"));
    }
}
