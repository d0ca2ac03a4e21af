//! # Extension Host
//!
//! Discovers, validates, loads and unloads pluggable feature units inside a
//! long-running application. Every unit gets a [`CapabilityContext`] instead
//! of direct access to application internals.
//!
//! ## Architecture
//!
//! - **ModuleLoader**: dependency-checked registry of internal modules with a
//!   linear load order; refuses to unload a module others depend on
//! - **PluginLoader**: scans `<root>/plugins`, reads manifests, resolves entry
//!   points, loads them through an [`EntryLoader`] and validates the exports
//!   structurally before handing them to a [`PluginManager`]
//! - **CapabilityContext**: event bus, command / panel / inspector registries,
//!   filesystem, dialog and notification services
//! - **Bootstrap**: single-use assembly of all of the above into an [`AppContext`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use extension_host::*;
//!
//! # async fn run() -> HostResult<()> {
//! let app = Bootstrap::new().initialize(BootstrapOptions::new("/path/to/project"))?;
//!
//! app.context.commands().register(Command::new("scene.save", "Save Scene", |_ctx| async {
//!     Ok(())
//! }));
//!
//! let report = app.load_project_plugins().await?;
//! println!("installed: {:?}", report.installed);
//!
//! app.context.commands().execute("scene.save", &app.context).await?;
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod command;
pub mod context;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod event;
pub mod inspector;
pub mod manifest;
pub mod module;
pub mod module_loader;
pub mod native;
pub mod panel;
pub mod plugin;
pub mod services;
pub mod utils;

mod registry;

// Re-exports for convenience
pub use bootstrap::{default_entry_loader, AppContext, Bootstrap, BootstrapOptions};
pub use command::{Command, CommandOutcome, CommandRegistry};
pub use context::{CapabilityContext, CapabilityContextBuilder};
pub use discovery::{DiscoveryReport, PluginLoader, PluginOutcome, SkippedPlugin};
pub use entry::{CompositeEntryLoader, EntryLoader, ModuleSpecifier, StaticEntryLoader};
pub use error::{EventError, HostError, HostResult};
pub use event::{EventBus, EventData, EventHandler, EventStats, SubscriptionId};
pub use inspector::{InspectorExtension, InspectorRegistry};
pub use manifest::{resolve_entry_point, EntrySource, ExportTarget, PluginLoaderConfig, PluginManifest, ResolvedEntry};
pub use module::{Module, ModuleEntry};
pub use module_loader::{BatchLoadReport, ModuleLoader};
pub use native::{ffi_guard, native_method, ExportsDescriptor, NativeEntryLoader, NativeLoaderConfig};
pub use panel::{PanelDescriptor, PanelLocation, PanelRegistry};
pub use plugin::{
    validate_exports, EditorPlugin, EditorPluginManager, ExportObject, ExportValue, LoadedEntry,
    PluginManager, PluginMethod, Property,
};
pub use services::{
    DialogOptions, DialogService, DirEntry, FileFilter, FileSystem, HeadlessDialogs, LocalFileSystem,
    LogNotifications, Notification, NotificationId, NotificationLevel, NotificationService,
};

/// ABI version native plugins are checked against
pub const ABI_VERSION: &str = env!("CARGO_PKG_VERSION");
