//! Capability context handed to every module and plugin
//!
//! The context is the only channel a module gets for affecting the host:
//! event bus, command / panel / inspector registries, filesystem, dialogs and
//! notifications. It is built once and cloned cheaply; all clones share the
//! same services.

use crate::command::CommandRegistry;
use crate::event::EventBus;
use crate::inspector::InspectorRegistry;
use crate::panel::PanelRegistry;
use crate::services::{
    DialogService, FileSystem, HeadlessDialogs, LocalFileSystem, LogNotifications,
    NotificationService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct CapabilityContext {
    event_bus: Arc<EventBus>,
    commands: Arc<CommandRegistry>,
    panels: Arc<PanelRegistry>,
    inspectors: Arc<InspectorRegistry>,
    filesystem: Arc<dyn FileSystem>,
    dialogs: Arc<dyn DialogService>,
    notifications: Arc<dyn NotificationService>,
}

impl CapabilityContext {
    pub fn builder() -> CapabilityContextBuilder {
        CapabilityContextBuilder::default()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn panels(&self) -> &Arc<PanelRegistry> {
        &self.panels
    }

    pub fn inspectors(&self) -> &Arc<InspectorRegistry> {
        &self.inspectors
    }

    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.filesystem
    }

    pub fn dialogs(&self) -> &Arc<dyn DialogService> {
        &self.dialogs
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationService> {
        &self.notifications
    }
}

impl std::fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("commands", &self.commands.len())
            .field("panels", &self.panels.len())
            .field("inspectors", &self.inspectors.len())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`CapabilityContext`]; services left unset use the headless defaults
#[derive(Default)]
pub struct CapabilityContextBuilder {
    event_bus: Option<Arc<EventBus>>,
    commands: Option<Arc<CommandRegistry>>,
    panels: Option<Arc<PanelRegistry>>,
    inspectors: Option<Arc<InspectorRegistry>>,
    filesystem: Option<Arc<dyn FileSystem>>,
    dialogs: Option<Arc<dyn DialogService>>,
    notifications: Option<Arc<dyn NotificationService>>,
}

impl CapabilityContextBuilder {
    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn commands(mut self, commands: Arc<CommandRegistry>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn panels(mut self, panels: Arc<PanelRegistry>) -> Self {
        self.panels = Some(panels);
        self
    }

    pub fn inspectors(mut self, inspectors: Arc<InspectorRegistry>) -> Self {
        self.inspectors = Some(inspectors);
        self
    }

    pub fn filesystem(mut self, filesystem: Arc<dyn FileSystem>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    pub fn dialogs(mut self, dialogs: Arc<dyn DialogService>) -> Self {
        self.dialogs = Some(dialogs);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationService>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn build(self) -> CapabilityContext {
        CapabilityContext {
            event_bus: self.event_bus.unwrap_or_default(),
            commands: self.commands.unwrap_or_default(),
            panels: self.panels.unwrap_or_default(),
            inspectors: self.inspectors.unwrap_or_default(),
            filesystem: self.filesystem.unwrap_or_else(|| Arc::new(LocalFileSystem)),
            dialogs: self.dialogs.unwrap_or_else(|| Arc::new(HeadlessDialogs::new())),
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(LogNotifications::new())),
        }
    }
}
