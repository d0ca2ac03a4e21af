//! Host services exposed to modules through the capability context
//!
//! Each service is a trait so a host can substitute its own implementation
//! (a UI toolkit's dialogs, a virtual filesystem, ...). The defaults here are
//! suitable for headless hosts and tests.

use crate::error::{HostError, HostResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Entry returned by [`FileSystem::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Filesystem abstraction
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> HostResult<String>;

    async fn write(&self, path: &Path, contents: &str) -> HostResult<()>;

    /// Immediate children of a directory, sorted by name
    async fn list(&self, path: &Path) -> HostResult<Vec<DirEntry>>;

    async fn exists(&self, path: &Path) -> bool;

    /// Create a directory and any missing parents
    async fn create_dir(&self, path: &Path) -> HostResult<()>;

    /// Remove a file or a directory tree
    async fn remove(&self, path: &Path) -> HostResult<()>;
}

/// [`FileSystem`] backed by the local disk via `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_to_string(&self, path: &Path) -> HostResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, contents: &str) -> HostResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn list(&self, path: &Path) -> HostResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(path).await?;
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_dir: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir(&self, path: &Path) -> HostResult<()> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn remove(&self, path: &Path) -> HostResult<()> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// File filter shown by open/save dialogs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Options for open/save dialogs
#[derive(Debug, Clone, Default)]
pub struct DialogOptions {
    pub title: Option<String>,
    pub default_path: Option<PathBuf>,
    pub filters: Vec<FileFilter>,
    pub multiple: bool,
    pub directory: bool,
}

/// Dialog abstraction
#[async_trait]
pub trait DialogService: Send + Sync {
    /// Ask for one or more existing paths; empty when cancelled
    async fn open(&self, options: DialogOptions) -> HostResult<Vec<PathBuf>>;

    /// Ask for a destination path; `None` when cancelled
    async fn save(&self, options: DialogOptions) -> HostResult<Option<PathBuf>>;

    async fn confirm(&self, title: &str, message: &str) -> HostResult<bool>;
}

/// Dialog service for hosts without a UI; answers from queued responses
#[derive(Debug, Default)]
pub struct HeadlessDialogs {
    open_responses: Mutex<VecDeque<Vec<PathBuf>>>,
    save_responses: Mutex<VecDeque<Option<PathBuf>>>,
    confirm_responses: Mutex<VecDeque<bool>>,
}

impl HeadlessDialogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_open(&self, paths: Vec<PathBuf>) {
        if let Ok(mut queue) = self.open_responses.lock() {
            queue.push_back(paths);
        }
    }

    pub fn queue_save(&self, path: Option<PathBuf>) {
        if let Ok(mut queue) = self.save_responses.lock() {
            queue.push_back(path);
        }
    }

    pub fn queue_confirm(&self, answer: bool) {
        if let Ok(mut queue) = self.confirm_responses.lock() {
            queue.push_back(answer);
        }
    }

    fn pop<T>(queue: &Mutex<VecDeque<T>>) -> HostResult<Option<T>> {
        queue
            .lock()
            .map(|mut q| q.pop_front())
            .map_err(|e| HostError::PluginFailed(format!("dialog queue poisoned: {}", e)))
    }
}

#[async_trait]
impl DialogService for HeadlessDialogs {
    async fn open(&self, options: DialogOptions) -> HostResult<Vec<PathBuf>> {
        debug!("Headless open dialog: {:?}", options.title);
        Ok(Self::pop(&self.open_responses)?.unwrap_or_default())
    }

    async fn save(&self, options: DialogOptions) -> HostResult<Option<PathBuf>> {
        debug!("Headless save dialog: {:?}", options.title);
        Ok(Self::pop(&self.save_responses)?.flatten())
    }

    async fn confirm(&self, title: &str, message: &str) -> HostResult<bool> {
        debug!("Headless confirm dialog '{}': {}", title, message);
        Ok(Self::pop(&self.confirm_responses)?.unwrap_or(false))
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Notification to show to the user
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: Option<String>,
    /// Auto-hide delay in milliseconds; `None` keeps it until hidden
    pub duration_ms: Option<u64>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: None,
            duration_ms: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Identifier of a shown notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(Uuid);

/// Notification abstraction
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn show(&self, notification: Notification) -> HostResult<NotificationId>;

    /// Hide a notification; unknown ids are ignored
    async fn hide(&self, id: NotificationId) -> HostResult<()>;
}

/// Notification service that writes to the log and tracks what is visible
#[derive(Default)]
pub struct LogNotifications {
    visible: DashMap<NotificationId, Notification>,
}

impl LogNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }
}

#[async_trait]
impl NotificationService for LogNotifications {
    async fn show(&self, notification: Notification) -> HostResult<NotificationId> {
        let id = NotificationId(Uuid::new_v4());
        let text = match &notification.message {
            Some(message) => format!("{}: {}", notification.title, message),
            None => notification.title.clone(),
        };
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => info!("[notify] {}", text),
            NotificationLevel::Warning => warn!("[notify] {}", text),
            NotificationLevel::Error => error!("[notify] {}", text),
        }
        self.visible.insert(id, notification);
        Ok(id)
    }

    async fn hide(&self, id: NotificationId) -> HostResult<()> {
        self.visible.remove(&id);
        Ok(())
    }
}
