//! Settings hot reload.
//!
//! [`SettingsWatcher`] watches the directory containing the settings file
//! (editors often replace files instead of writing in place, which a watch on
//! the file itself would miss), waits for a burst of events to settle, then
//! re-loads and repairs the file and hands the result to a callback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::integrity::check_integrity;
use crate::loader::load_settings_from_path;
use crate::types::BridgeSettings;

/// Default quiet period before a change is reloaded.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Callback invoked with freshly loaded settings.
pub type SettingsCallback = Arc<dyn Fn(BridgeSettings) + Send + Sync>;

/// Watches a settings file and reloads it on change.
///
/// Dropping the watcher stops watching.
pub struct SettingsWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl SettingsWatcher {
    /// Start watching `path` with the default debounce.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(path: impl Into<PathBuf>, callback: F) -> Result<Self>
    where
        F: Fn(BridgeSettings) + Send + Sync + 'static,
    {
        Self::spawn_with_debounce(path, DEFAULT_DEBOUNCE, callback)
    }

    /// Start watching `path`, reloading once events have been quiet for
    /// `debounce`.
    pub fn spawn_with_debounce<F>(
        path: impl Into<PathBuf>,
        debounce: Duration,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(BridgeSettings) + Send + Sync + 'static,
    {
        let path = path.into();
        let dir = watch_dir(&path);
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "settings watcher error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let task = tokio::spawn(reload_loop(
            path.clone(),
            debounce,
            rx,
            Arc::new(callback) as SettingsCallback,
        ));

        info!(path = %path.display(), "watching settings file");
        Ok(Self {
            path,
            _watcher: watcher,
            task,
        })
    }

    /// The watched settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_relevant(event: &Event, path: &Path) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    ) {
        return false;
    }
    let Some(name) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

async fn reload_loop(
    path: PathBuf,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Event>,
    callback: SettingsCallback,
) {
    while let Some(event) = rx.recv().await {
        if !is_relevant(&event, &path) {
            continue;
        }

        // Swallow the rest of the burst.
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match load_settings_from_path(&path) {
            Ok(mut settings) => {
                let issues = check_integrity(&mut settings);
                debug!(path = %path.display(), repairs = issues.len(), "settings reloaded");
                callback(settings);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings reload failed, keeping previous settings");
            }
        }
    }
}
