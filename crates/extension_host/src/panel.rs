//! Panel registry

use crate::registry::KeyedStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where the host should dock a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelLocation {
    Left,
    Right,
    Bottom,
    #[default]
    Center,
}

/// A panel descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub id: String,
    pub title: String,
    /// Component identifier the host renders for this panel
    pub component: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub location: PanelLocation,
    /// Sort key; lower first
    #[serde(default)]
    pub order: i32,
}

impl PanelDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            component: component.into(),
            category: None,
            icon: None,
            location: PanelLocation::default(),
            order: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_location(mut self, location: PanelLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Registry of panels keyed by id
pub struct PanelRegistry {
    panels: KeyedStore<PanelDescriptor>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self {
            panels: KeyedStore::new("Panel"),
        }
    }

    /// Register a panel, overwriting any panel with the same id
    pub fn register(&self, panel: PanelDescriptor) {
        let id = panel.id.clone();
        self.panels.insert(&id, panel);
    }

    /// Remove a panel; absent ids are ignored
    pub fn unregister(&self, id: &str) {
        self.panels.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<PanelDescriptor>> {
        self.panels.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.panels.contains(id)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.len() == 0
    }

    /// Panels sorted by `order`, ties in registration order, optionally filtered by category
    pub fn list(&self, category: Option<&str>) -> Vec<Arc<PanelDescriptor>> {
        let mut panels: Vec<Arc<PanelDescriptor>> = self
            .panels
            .values()
            .into_iter()
            .filter(|panel| match category {
                Some(category) => panel.category.as_deref() == Some(category),
                None => true,
            })
            .collect();
        // stable sort keeps registration order for equal `order`
        panels.sort_by_key(|panel| panel.order);
        panels
    }
}

impl Default for PanelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(panels: &[Arc<PanelDescriptor>]) -> Vec<&str> {
        panels.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_list_sorted_by_order_then_insertion() {
        let registry = PanelRegistry::new();
        registry.register(PanelDescriptor::new("console", "Console", "ConsolePanel").with_order(10));
        registry.register(PanelDescriptor::new("scene", "Scene", "SceneTree"));
        registry.register(PanelDescriptor::new("assets", "Assets", "AssetBrowser"));
        registry.register(PanelDescriptor::new("toolbar", "Toolbar", "Toolbar").with_order(-1));

        assert_eq!(ids(&registry.list(None)), vec!["toolbar", "scene", "assets", "console"]);
    }

    #[test]
    fn test_category_filter() {
        let registry = PanelRegistry::new();
        registry.register(PanelDescriptor::new("scene", "Scene", "SceneTree").with_category("world"));
        registry.register(PanelDescriptor::new("profiler", "Profiler", "Profiler").with_category("debug"));
        registry.register(PanelDescriptor::new("entities", "Entities", "EntityList").with_category("world").with_order(-5));

        assert_eq!(ids(&registry.list(Some("world"))), vec!["entities", "scene"]);
        assert_eq!(ids(&registry.list(Some("missing"))), Vec::<&str>::new());
    }

    #[test]
    fn test_overwrite_and_unregister() {
        let registry = PanelRegistry::new();
        registry.register(PanelDescriptor::new("scene", "Scene", "SceneTree"));
        registry.register(PanelDescriptor::new("scene", "Hierarchy", "SceneTree"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("scene").unwrap().title, "Hierarchy");

        registry.unregister("scene");
        registry.unregister("scene");
        assert!(registry.is_empty());
    }
}
