//! Inspector extension registry
//!
//! An inspector extension contributes a section to the property inspector
//! for one component type. Rendering is the host's business; the registry
//! only tracks which extensions exist and in what order they appear.

use crate::registry::KeyedStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorExtension {
    pub id: String,
    /// Component type name this extension applies to
    pub target: String,
    pub title: String,
    /// Component identifier the host renders
    pub component: String,
    #[serde(default)]
    pub order: i32,
}

impl InspectorExtension {
    pub fn new(
        id: impl Into<String>,
        target: impl Into<String>,
        title: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            title: title.into(),
            component: component.into(),
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

pub struct InspectorRegistry {
    extensions: KeyedStore<InspectorExtension>,
}

impl InspectorRegistry {
    pub fn new() -> Self {
        Self {
            extensions: KeyedStore::new("Inspector extension"),
        }
    }

    pub fn register(&self, extension: InspectorExtension) {
        let id = extension.id.clone();
        self.extensions.insert(&id, extension);
    }

    pub fn unregister(&self, id: &str) {
        self.extensions.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<InspectorExtension>> {
        self.extensions.get(id)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.len() == 0
    }

    /// Extensions for a component type, sorted by `order` then registration
    pub fn for_target(&self, target: &str) -> Vec<Arc<InspectorExtension>> {
        let mut matching: Vec<Arc<InspectorExtension>> = self
            .extensions
            .values()
            .into_iter()
            .filter(|extension| extension.target == target)
            .collect();
        matching.sort_by_key(|extension| extension.order);
        matching
    }

    pub fn clear(&self) {
        self.extensions.clear();
    }
}

impl Default for InspectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_target_filters_and_sorts() {
        let registry = InspectorRegistry::new();
        registry.register(InspectorExtension::new("light.preview", "Light", "Preview", "LightPreview").with_order(5));
        registry.register(InspectorExtension::new("mesh.stats", "Mesh", "Stats", "MeshStats"));
        registry.register(InspectorExtension::new("light.color", "Light", "Color", "ColorPicker"));

        let light: Vec<String> = registry
            .for_target("Light")
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(light, vec!["light.color", "light.preview"]);
        assert_eq!(registry.for_target("Camera").len(), 0);
    }

    #[test]
    fn test_clear() {
        let registry = InspectorRegistry::new();
        registry.register(InspectorExtension::new("mesh.stats", "Mesh", "Stats", "MeshStats"));
        registry.clear();
        assert!(registry.is_empty());
    }
}
