//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - Watches the parent directory and filters by file name, so editors that
//!   save through rename-replace keep triggering reloads
//! - Only configurations that load and validate are forwarded
//! - A reload identical to the last forwarded one is dropped; one save
//!   usually produces several events

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Watches one configuration file and forwards each new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching on notify's background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path);
        let file_name = self.path.file_name().map(OsString::from).ok_or_else(|| {
            notify::Error::generic("config path has no file name")
                .add_path(self.path.clone())
        })?;

        let mut reload = Reload {
            path: self.path.clone(),
            file_name,
            update_tx: self.update_tx,
            last_sent: None,
        };
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reload.on_event(&event),
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct Reload {
    path: PathBuf,
    file_name: OsString,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
    last_sent: Option<ProxyConfig>,
}

impl Reload {
    fn on_event(&mut self, event: &Event) {
        if !(event.kind.is_modify() || event.kind.is_create()) || !self.touches(event) {
            return;
        }
        // A truncated file mid-write would parse as all defaults.
        if std::fs::metadata(&self.path).map_or(true, |meta| meta.len() == 0) {
            return;
        }

        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                return;
            }
        };
        if self.last_sent.as_ref() == Some(&config) {
            return;
        }

        tracing::info!(path = ?self.path, "Config file changed, forwarding reload");
        match self.update_tx.send(config.clone()) {
            Ok(()) => self.last_sent = Some(config),
            Err(_) => tracing::warn!("Config update receiver is gone; reload discarded"),
        }
    }

    fn touches(&self, event: &Event) -> bool {
        event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(self.file_name.as_os_str()))
    }
}
