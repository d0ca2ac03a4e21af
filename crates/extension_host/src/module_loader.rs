//! Dependency-checked registry of live modules
//!
//! The loader never reorders single loads: a module whose dependencies are
//! not registered yet is rejected. Batch loads via [`ModuleLoader::load_modules`]
//! are sorted topologically first, and rejected as a whole when the batch
//! contains a dependency cycle.
//!
//! All lifecycle operations are serialized through one async mutex, so the
//! registry and the load order are always mutated together.

use crate::context::CapabilityContext;
use crate::error::{HostError, HostResult};
use crate::module::{guarded, Module, ModuleEntry};
use crate::utils::current_timestamp;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct LoaderState {
    modules: HashMap<String, ModuleEntry>,
    load_order: Vec<String>,
}

/// Outcome of [`ModuleLoader::load_modules`]
#[derive(Debug, Default)]
pub struct BatchLoadReport {
    /// Ids registered by this batch, in load order
    pub loaded: Vec<String>,
    /// Modules that failed, with the reason
    pub failed: Vec<(String, HostError)>,
}

impl BatchLoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ModuleLoader {
    lifecycle: Mutex<()>,
    state: RwLock<LoaderState>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(()),
            state: RwLock::new(LoaderState::default()),
        }
    }

    /// Load a single module. Already-registered ids are a no-op.
    pub async fn load_module(&self, module: Arc<dyn Module>, context: &CapabilityContext) -> HostResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.load_locked(module, context).await
    }

    /// Unload a module. Unknown ids are a no-op; modules with loaded dependents are refused.
    pub async fn unload_module(&self, id: &str) -> HostResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.unload_locked(id).await
    }

    /// Reload a module, in place when it supports that, otherwise unload + load
    pub async fn reload_module(&self, id: &str, context: &CapabilityContext) -> HostResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let module = {
            let state = self.state.read().await;
            state
                .modules
                .get(id)
                .map(|entry| entry.module.clone())
                .ok_or_else(|| HostError::ModuleNotFound(id.to_string()))?
        };

        if module.reloads_in_place() {
            info!("Reloading module in place: {}", id);
            guarded(&format!("module '{}' reload", id), module.reload(context)).await?;

            let mut state = self.state.write().await;
            if let Some(entry) = state.modules.get_mut(id) {
                entry.loaded_at = current_timestamp();
            }
            return Ok(());
        }

        info!("Reloading module via unload + load: {}", id);
        self.unload_locked(id).await?;
        self.load_locked(module, context).await
    }

    /// Load a batch of modules in dependency order.
    ///
    /// Fails up front with [`HostError::DependencyCycle`] if the batch contains
    /// a cycle. Otherwise every module is attempted; individual failures are
    /// collected in the report and do not stop the remaining modules.
    pub async fn load_modules(
        &self,
        modules: Vec<Arc<dyn Module>>,
        context: &CapabilityContext,
    ) -> HostResult<BatchLoadReport> {
        let _lifecycle = self.lifecycle.lock().await;

        let ordered = topological_order(modules)?;
        let mut report = BatchLoadReport::default();

        for module in ordered {
            let id = module.id().to_string();
            let was_loaded = self.state.read().await.modules.contains_key(&id);
            match self.load_locked(module, context).await {
                Ok(()) if !was_loaded => report.loaded.push(id),
                Ok(()) => {}
                Err(e) => {
                    error!("Failed to load module {}: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Module batch complete: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Unload every module, dependents first. Returns the ids that were removed.
    pub async fn unload_all(&self) -> Vec<String> {
        let _lifecycle = self.lifecycle.lock().await;

        let order: Vec<String> = self.state.read().await.load_order.iter().rev().cloned().collect();
        let mut removed = Vec::new();

        for id in order {
            match self.unload_locked(&id).await {
                Ok(()) => removed.push(id),
                Err(e) => error!("Failed to unload module {}: {}", id, e),
            }
        }

        removed
    }

    pub async fn get_module(&self, id: &str) -> Option<ModuleEntry> {
        self.state.read().await.modules.get(id).cloned()
    }

    /// Snapshot of all registered modules, in no particular order
    pub async fn get_all_modules(&self) -> Vec<ModuleEntry> {
        self.state.read().await.modules.values().cloned().collect()
    }

    /// Snapshot of the load order
    pub async fn get_load_order(&self) -> Vec<String> {
        self.state.read().await.load_order.clone()
    }

    pub async fn is_loaded(&self, id: &str) -> bool {
        self.state.read().await.modules.contains_key(id)
    }

    pub async fn module_count(&self) -> usize {
        self.state.read().await.modules.len()
    }

    async fn load_locked(&self, module: Arc<dyn Module>, context: &CapabilityContext) -> HostResult<()> {
        let id = module.id().to_string();

        {
            let state = self.state.read().await;
            if state.modules.contains_key(&id) {
                info!("Module already loaded: {}", id);
                return Ok(());
            }

            for dependency in module.dependencies() {
                if dependency == &id {
                    return Err(HostError::DependencyCycle(vec![id.clone(), id]));
                }
                if !state.modules.contains_key(dependency) {
                    return Err(HostError::DependencyNotLoaded {
                        module: id,
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        debug!("Loading module: {} ({})", id, module.name());
        guarded(&format!("module '{}' load", id), module.load(context)).await?;

        let mut state = self.state.write().await;
        state.modules.insert(
            id.clone(),
            ModuleEntry {
                module,
                loaded: true,
                loaded_at: current_timestamp(),
            },
        );
        state.load_order.push(id.clone());

        info!("Module loaded: {}", id);
        Ok(())
    }

    async fn unload_locked(&self, id: &str) -> HostResult<()> {
        let module = {
            let state = self.state.read().await;
            let Some(entry) = state.modules.get(id) else {
                warn!("Module not loaded, nothing to unload: {}", id);
                return Ok(());
            };

            let dependents: Vec<String> = state
                .load_order
                .iter()
                .filter(|other| {
                    state
                        .modules
                        .get(other.as_str())
                        .map(|e| e.module.dependencies().iter().any(|d| d == id))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();

            if !dependents.is_empty() {
                return Err(HostError::ModuleInUse {
                    module: id.to_string(),
                    dependents,
                });
            }

            entry.module.clone()
        };

        debug!("Unloading module: {}", id);
        if let Err(e) = guarded(&format!("module '{}' unload", id), module.unload()).await {
            error!("Module {} unload hook failed, removing anyway: {}", id, e);
        }

        let mut state = self.state.write().await;
        state.modules.remove(id);
        state.load_order.retain(|other| other != id);

        info!("Module unloaded: {}", id);
        Ok(())
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order a batch so every module comes after its in-batch dependencies.
///
/// Three-colour DFS; the first back edge found is reported as a cycle path
/// that starts and ends with the same id. Duplicate ids keep the first entry.
fn topological_order(modules: Vec<Arc<dyn Module>>) -> HostResult<Vec<Arc<dyn Module>>> {
    let mut by_id: HashMap<String, Arc<dyn Module>> = HashMap::new();
    let mut input_order = Vec::new();
    for module in modules {
        let id = module.id().to_string();
        if by_id.contains_key(&id) {
            debug!("Duplicate module in batch ignored: {}", id);
            continue;
        }
        input_order.push(id.clone());
        by_id.insert(id, module);
    }

    fn visit(
        id: &str,
        by_id: &HashMap<String, Arc<dyn Module>>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
        ordered: &mut Vec<String>,
    ) -> HostResult<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| p == id).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].to_vec();
                cycle.push(id.to_string());
                return Err(HostError::DependencyCycle(cycle));
            }
            None => {}
        }

        let Some(module) = by_id.get(id) else {
            // outside the batch: already registered or reported at load time
            return Ok(());
        };

        marks.insert(id.to_string(), Mark::Visiting);
        path.push(id.to_string());
        for dependency in module.dependencies() {
            visit(dependency, by_id, marks, path, ordered)?;
        }
        path.pop();
        marks.insert(id.to_string(), Mark::Done);
        ordered.push(id.to_string());
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    let mut ordered = Vec::new();
    for id in &input_order {
        visit(id, &by_id, &mut marks, &mut path, &mut ordered)?;
    }

    let mut seen = HashSet::new();
    Ok(ordered
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .filter_map(|id| by_id.remove(&id))
        .collect())
}
