//! Configuration file watcher for route hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;

/// Watches the router configuration file and publishes every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &watched) => {
                    if let Some(config) = reload(&watched) {
                        let _ = update_tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` rewrote the file at `path`.
fn touches(event: &Event, path: &Path) -> bool {
    let rewritten = event.kind.is_modify() || event.kind.is_create();
    // Some backends report no paths at all.
    rewritten && (event.paths.is_empty() || event.paths.iter().any(|p| p.ends_with(path)))
}

/// Load a new revision, or `None` when it fails to load or validate.
fn reload(path: &Path) -> Option<RouterConfig> {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(
                path = ?path,
                routes = config.routes.len(),
                "Config file changed, routes will be reloaded"
            );
            Some(config)
        }
        Err(e) => {
            tracing::error!(
                path = ?path,
                error = %e,
                "Failed to reload config, keeping current routes"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, EventKind, ModifyKind};
    use std::io::Write;

    #[test]
    fn test_touches_only_rewrites_of_watched_file() {
        let path = Path::new("/etc/router/router.toml");

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf());
        assert!(touches(&modify, path));

        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/router/.router.toml.swp"));
        assert!(!touches(&other, path));

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(path.to_path_buf());
        assert!(!touches(&access, path));
    }

    #[test]
    fn test_reload_rejects_invalid_revision() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[routes]]
            name = "lb"
            path_prefix = "/lb"
            policy = "random"
            max_instances = 0
            "#
        )
        .unwrap();

        assert!(reload(file.path()).is_none());
    }

    #[test]
    fn test_reload_accepts_valid_revision() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[routes]]
            name = "app"
            path_prefix = "/app"
            policy = "named"
            instance = "app"
            "#
        )
        .unwrap();

        let config = reload(file.path()).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].name, "app");
    }
}
