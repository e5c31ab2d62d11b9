use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bridge::ConfigStore;
use clap::Parser;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "remote-midi-server", about = "Browser button grid to MIDI note bridge")]
pub(crate) struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    pub(crate) config: PathBuf,
    /// Log notes instead of writing them to a MIDI output
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub(crate) log_level: String,
    /// Quiet period after the last change to the config file before it is reloaded
    #[arg(long, default_value_t = 200)]
    pub(crate) reload_debounce_ms: u64,
}

impl Cli {
    pub(crate) fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }

    pub(crate) fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.reload_debounce_ms)
    }
}

type WatchEvent = notify::Result<Event>;

/// Keeps the config file watched. Dropping it stops both the OS watch and
/// the reload task.
pub(crate) struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Editors often save by writing a temp file and renaming it over the
/// original, so the parent directory is watched rather than the file.
fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn touches(event: &Event, file_name: &OsStr) -> bool {
    !matches!(event.kind, EventKind::Access(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

/// Watches the store's file and calls [`ConfigStore::reload`] once a burst
/// of changes has been quiet for `debounce`. A rejected or vanished file is
/// logged by the store and the live snapshot stays.
pub(crate) fn spawn_config_watcher(
    store: Arc<ConfigStore>,
    debounce: Duration,
) -> notify::Result<ConfigWatcher> {
    let path = store.path().to_path_buf();
    let file_name = path
        .file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| notify::Error::path_not_found().add_path(path.clone()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: WatchEvent| {
        // receiver gone means the watcher is shutting down
        let _ = tx.send(event);
    })?;
    watcher.watch(watch_dir(&path), RecursiveMode::NonRecursive)?;
    info!(path = %path.display(), ?debounce, "watching config file");

    let task = tokio::spawn(reload_on_change(store, file_name, rx, debounce));
    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

async fn reload_on_change(
    store: Arc<ConfigStore>,
    file_name: OsString,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    debounce: Duration,
) {
    while let Some(event) = events.recv().await {
        match event {
            Ok(event) if touches(&event, &file_name) => {}
            Ok(_) => continue,
            Err(error) => {
                warn!(%error, "config watch error");
                continue;
            }
        }

        loop {
            match tokio::time::timeout(debounce, events.recv()).await {
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(_) => break,
            }
        }

        debug!(path = %store.path().display(), "config file changed");
        let target = Arc::clone(&store);
        let reload = tokio::task::spawn_blocking(move || {
            // rejection is logged by the store
            let _ = target.reload();
        });
        if let Err(error) = reload.await {
            warn!(%error, "config reload task failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
