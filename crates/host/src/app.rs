//! Main application logic and lifecycle management.
//!
//! The `Application` loads configuration, bootstraps the extension host,
//! loads the built-in modules, discovers project plugins and then waits for a
//! shutdown signal before tearing everything down in reverse order.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::wait_for_shutdown};
use async_trait::async_trait;
use extension_host::{
    AppContext, Bootstrap, BootstrapOptions, CapabilityContext, Command, EditorPluginManager,
    EventBus, HostResult, Module, Notification, NotificationLevel, PanelDescriptor, PanelLocation,
    SubscriptionId,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Built-in module every host loads first
pub struct CoreModule {
    subscription: Mutex<Option<(Arc<EventBus>, SubscriptionId)>>,
}

impl CoreModule {
    pub const ID: &'static str = "host.core";
    pub const STATUS_COMMAND: &'static str = "host.status";

    pub fn new() -> Self {
        Self {
            subscription: Mutex::new(None),
        }
    }
}

impl Default for CoreModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for CoreModule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Host Core"
    }

    async fn load(&self, context: &CapabilityContext) -> HostResult<()> {
        context.commands().register(
            Command::new(Self::STATUS_COMMAND, "Show Host Status", |ctx: CapabilityContext| async move {
                let stats = ctx.event_bus().stats().await;
                info!(
                    "Host status: {} commands | {} panels | {} inspector extensions | {} events published",
                    ctx.commands().len(),
                    ctx.panels().len(),
                    ctx.inspectors().len(),
                    stats.events_published
                );
                Ok(())
            })
            .with_category("host"),
        );

        context.panels().register(
            PanelDescriptor::new("host.plugins", "Plugins", "PluginList")
                .with_category("host")
                .with_location(PanelLocation::Left)
                .with_order(100),
        );

        // surface plugin installs through the notification service
        let notifications = context.notifications().clone();
        let id = context
            .event_bus()
            .subscribe(EditorPluginManager::INSTALLED_TOPIC, move |event| {
                let name = event.payload["displayName"].as_str().unwrap_or("plugin").to_string();
                let notifications = notifications.clone();
                tokio::spawn(async move {
                    let notification =
                        Notification::new(NotificationLevel::Info, "Plugin installed").with_message(name);
                    if let Err(e) = notifications.show(notification).await {
                        warn!("Failed to show notification: {}", e);
                    }
                });
                Ok(())
            })
            .await?;
        *self.subscription.lock().await = Some((context.event_bus().clone(), id));

        Ok(())
    }

    async fn unload(&self) -> HostResult<()> {
        if let Some((event_bus, id)) = self.subscription.lock().await.take() {
            event_bus.unsubscribe(id).await;
        }
        Ok(())
    }
}

/// Main application struct.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    bootstrap: Bootstrap,
}

impl Application {
    /// Load configuration, apply CLI overrides and validate.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        config.apply_overrides(&args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("Configuration loaded and validated successfully");

        display_banner();

        Ok(Self {
            config,
            bootstrap: Bootstrap::new(),
        })
    }

    /// Bring the host up. Separate from [`Application::run`] so it can be driven without signals.
    pub async fn start(&self) -> Result<AppContext, Box<dyn std::error::Error>> {
        self.log_configuration_summary();

        let app = self.bootstrap.initialize(
            BootstrapOptions::new(self.config.host.root.clone())
                .with_plugin_config(self.config.plugins.loader.clone()),
        )?;

        let core: Arc<dyn Module> = Arc::new(CoreModule::new());
        let report = app.modules.load_modules(vec![core], &app.context).await?;
        for (id, e) in &report.failed {
            error!("Built-in module {} failed to load: {}", id, e);
        }

        if self.config.plugins.auto_load {
            let report = app.load_project_plugins().await?;
            for skipped in &report.skipped {
                warn!("Plugin '{}' skipped: {}", skipped.directory, skipped.reason);
            }
        } else {
            info!("Plugin auto-load disabled");
        }

        app.context
            .commands()
            .execute(CoreModule::STATUS_COMMAND, &app.context)
            .await?;

        Ok(app)
    }

    /// Runs until a shutdown signal arrives, then tears the host down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Starting extension host");
        let app = self.start().await?;

        info!("Extension host is running, press Ctrl+C to shut down");
        wait_for_shutdown().await?;

        // a second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again, exiting immediately");
            std::process::exit(1);
        });

        app.shutdown().await;

        let stats = app.context.event_bus().stats().await;
        info!("Final statistics:");
        info!("  - Events published: {}", stats.events_published);
        info!("  - Handler failures: {}", stats.handler_failures);
        info!("Extension host shutdown complete");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("Configuration Summary:");
        info!("  Project root: {}", self.config.host.root.display());
        info!("  Plugins directory: {}", self.config.plugins.loader.plugins_dir);
        info!("  Manifest file: {}", self.config.plugins.loader.manifest_file);
        info!("  Prefer source entries: {}", self.config.plugins.loader.prefer_source);
        info!("  Auto-load plugins: {}", self.config.plugins.auto_load);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(temp: &TempDir) -> CliArgs {
        CliArgs {
            config_path: temp.path().join("host.toml"),
            root: Some(temp.path().to_path_buf()),
            plugins_dir: None,
            log_level: None,
            json_logs: false,
            no_auto_load: false,
            danger_allow_abi_mismatch: false,
            strict_versioning: false,
        }
    }

    #[tokio::test]
    async fn test_start_and_shutdown_without_plugins() {
        let temp = TempDir::new().unwrap();
        let application = Application::new(args(&temp)).await.unwrap();
        assert!(temp.path().join("host.toml").exists());

        let app = application.start().await.unwrap();
        assert!(app.modules.is_loaded(CoreModule::ID).await);
        assert!(app.context.commands().has(CoreModule::STATUS_COMMAND));
        assert!(app.context.panels().has("host.plugins"));

        // bootstrap is single-use
        assert!(application.start().await.is_err());

        app.shutdown().await;
        assert_eq!(app.modules.module_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let mut cli = args(&temp);
        cli.log_level = Some("loud".to_string());
        assert!(Application::new(cli).await.is_err());
    }
}
