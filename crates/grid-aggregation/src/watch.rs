//! Per-filesystem watching of aggregation files.
//!
//! One notification service and one background loop run per filesystem that
//! holds at least one watched aggregation file. Registrations are keyed by
//! the aggregation file; the parent directory is what the service watches,
//! shared by every aggregation file in it.
//!
//! ```text
//! register(a.json) ──► ensure loop for fs ──► watch dir(a.json)
//!                                              │
//!        notify callback ──► mpsc ──► loop ──► owner(a.json).on_config_changed()
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use async_trait::async_trait;
use coverage_common::{CoverageError, CoverageResult};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::settings::{AggregationSettings, ReloadEvents};

/// Something reloaded when its aggregation file changes.
#[async_trait]
pub trait WatchTarget: Send + Sync {
    async fn on_config_changed(&self) -> CoverageResult<()>;
}

/// Map a notification service error into the coverage error type.
pub fn watch_error(err: notify::Error) -> CoverageError {
    CoverageError::Watch(err.to_string())
}

/// Identifies the filesystem (device) a path lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSystemId(u64);

impl FileSystemId {
    /// Filesystem holding `path`, which must exist.
    pub fn of(path: &Path) -> CoverageResult<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(&metadata))
    }

    #[cfg(unix)]
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self(metadata.dev())
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &std::fs::Metadata) -> Self {
        Self(0)
    }
}

impl fmt::Display for FileSystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev:{}", self.0)
    }
}

/// Notification service and loop for one filesystem.
struct FsWatch {
    watcher: RecommendedWatcher,
    token: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    filesystems: HashMap<FileSystemId, FsWatch>,
    /// Aggregation file -> owner.
    owners: HashMap<PathBuf, Weak<dyn WatchTarget>>,
    /// Watched directory -> filesystem it lives on.
    directories: HashMap<PathBuf, FileSystemId>,
}

/// Shared registry of watched aggregation files.
///
/// Bookkeeping is serialized by one lock; event delivery and reloads run
/// outside of it.
pub struct WatchRegistry {
    reload_events: ReloadEvents,
    state: Arc<Mutex<RegistryState>>,
}

impl WatchRegistry {
    pub fn new(reload_events: ReloadEvents) -> Self {
        Self {
            reload_events,
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Process-wide registry, reloading on the events configured in the environment.
    pub fn global() -> Arc<WatchRegistry> {
        static GLOBAL: OnceLock<Arc<WatchRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(WatchRegistry::new(AggregationSettings::from_env().reload_events)))
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the notification service and loop for `fs` if not running.
    pub fn ensure_started(&self, fs: FileSystemId) -> CoverageResult<()> {
        let mut state = self.lock();
        self.ensure_started_locked(&mut state, fs)
    }

    fn ensure_started_locked(&self, state: &mut RegistryState, fs: FileSystemId) -> CoverageResult<()> {
        match state.filesystems.get(&fs) {
            Some(watch) if !watch.task.is_finished() => return Ok(()),
            Some(_) => {
                // The runtime that ran the loop is gone.
                warn!(filesystem = %fs, "Configuration watch loop ended, restarting");
                if let Some(stale) = state.filesystems.remove(&fs) {
                    shutdown_watch(fs, stale);
                }
            }
            None => {}
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoverageError::Watch(format!("no async runtime: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the loop is shutting down.
            let _ = tx.send(res);
        })
        .map_err(watch_error)?;

        for (directory, _) in state.directories.iter().filter(|(_, d)| **d == fs) {
            if let Err(e) = watcher.watch(directory, RecursiveMode::NonRecursive) {
                warn!(directory = %directory.display(), error = %e, "Failed to resume watching directory");
            }
        }

        let token = CancellationToken::new();
        let task = runtime.spawn(watch_loop(
            fs,
            rx,
            token.clone(),
            Arc::downgrade(&self.state),
            self.reload_events,
        ));

        info!(filesystem = %fs, "Started configuration watch");
        state.filesystems.insert(
            fs,
            FsWatch {
                watcher,
                token,
                task,
            },
        );
        Ok(())
    }

    /// Watch `config_file` on behalf of `owner`.
    ///
    /// Registering the same file again replaces its owner.
    pub fn register(&self, config_file: &Path, owner: Weak<dyn WatchTarget>) -> CoverageResult<()> {
        let config_file = canonical(config_file);
        let directory = parent_of(&config_file)?;
        let fs = FileSystemId::of(&directory)?;

        let mut state = self.lock();
        self.ensure_started_locked(&mut state, fs)?;

        if !state.directories.contains_key(&directory) {
            let watch = state
                .filesystems
                .get_mut(&fs)
                .ok_or_else(|| CoverageError::Watch(format!("no watch running for {}", fs)))?;
            watch
                .watcher
                .watch(&directory, RecursiveMode::NonRecursive)
                .map_err(watch_error)?;
            state.directories.insert(directory.clone(), fs);
            debug!(directory = %directory.display(), filesystem = %fs, "Watching directory");
        }

        state.owners.insert(config_file.clone(), owner);
        info!(path = %config_file.display(), "Registered aggregation file for reload");
        Ok(())
    }

    /// Stop watching `config_file`. Returns the filesystem it was on, if registered.
    pub fn unregister(&self, config_file: &Path) -> Option<FileSystemId> {
        let config_file = canonical(config_file);
        let mut state = self.lock();
        state.owners.remove(&config_file)?;
        release_directory(&mut state, &config_file)
    }

    /// Unregister `config_file` if its owner is gone, stopping the loop when
    /// nothing else on that filesystem is watched.
    ///
    /// A live owner, possibly a newer one for the same file, is left alone.
    pub fn unregister_if_dropped(&self, config_file: &Path) -> bool {
        let config_file = canonical(config_file);
        let mut state = self.lock();
        prune_owner(&mut state, &config_file)
    }

    /// Stop the loop for `fs` when no watched directory remains on it.
    pub fn stop_if_orphaned(&self, fs: FileSystemId) -> bool {
        stop_orphaned(&mut self.lock(), fs)
    }

    /// Change notifications this registry reloads on.
    pub fn reload_events(&self) -> ReloadEvents {
        self.reload_events
    }

    /// Stop every loop and forget all registrations.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.owners.clear();
        state.directories.clear();
        for (fs, watch) in state.filesystems.drain() {
            shutdown_watch(fs, watch);
        }
    }

    /// True when a loop is running for `fs`.
    pub fn is_running(&self, fs: FileSystemId) -> bool {
        self.lock()
            .filesystems
            .get(&fs)
            .map(|w| !w.task.is_finished())
            .unwrap_or(false)
    }

    pub fn is_registered(&self, config_file: &Path) -> bool {
        self.lock().owners.contains_key(&canonical(config_file))
    }

    pub fn watched_directories(&self) -> usize {
        self.lock().directories.len()
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new(ReloadEvents::default())
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drop the directory watch of a just-removed owner when no other owner shares it.
fn release_directory(state: &mut RegistryState, config_file: &Path) -> Option<FileSystemId> {
    info!(path = %config_file.display(), "Unregistered aggregation file");
    let directory = parent_of(config_file).ok()?;
    let fs = state.directories.get(&directory).copied()?;
    let shared = state.owners.keys().any(|p| p.parent() == Some(directory.as_path()));
    if !shared {
        state.directories.remove(&directory);
        if let Some(watch) = state.filesystems.get_mut(&fs) {
            if let Err(e) = watch.watcher.unwatch(&directory) {
                warn!(directory = %directory.display(), error = %e, "Failed to unwatch directory");
            }
        }
        debug!(directory = %directory.display(), "Stopped watching directory");
    }
    Some(fs)
}

/// Remove the registration of `config_file` if its owner no longer exists.
fn prune_owner(state: &mut RegistryState, config_file: &Path) -> bool {
    let dead = state
        .owners
        .get(config_file)
        .map_or(false, |owner| owner.strong_count() == 0);
    if !dead {
        return false;
    }
    state.owners.remove(config_file);
    if let Some(fs) = release_directory(state, config_file) {
        stop_orphaned(state, fs);
    }
    true
}

fn stop_orphaned(state: &mut RegistryState, fs: FileSystemId) -> bool {
    if state.directories.values().any(|d| *d == fs) {
        return false;
    }
    match state.filesystems.remove(&fs) {
        Some(watch) => {
            shutdown_watch(fs, watch);
            true
        }
        None => false,
    }
}

fn shutdown_watch(fs: FileSystemId, watch: FsWatch) {
    watch.token.cancel();
    // Dropping the watcher closes the notification channel.
    drop(watch.watcher);
    info!(filesystem = %fs, "Stopped configuration watch");
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn parent_of(path: &Path) -> CoverageResult<PathBuf> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            CoverageError::invalid_argument(format!("{} has no parent directory", path.display()))
        })
}

async fn watch_loop(
    fs: FileSystemId,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    token: CancellationToken,
    state: Weak<Mutex<RegistryState>>,
    reload_events: ReloadEvents,
) {
    debug!(filesystem = %fs, "Configuration watch loop running");
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = events.recv() => received,
        };
        match received {
            Some(Ok(event)) => handle_event(&state, event, reload_events).await,
            Some(Err(e)) => warn!(filesystem = %fs, error = %e, "Watch notification error"),
            None => break,
        }
    }
    debug!(filesystem = %fs, "Configuration watch loop exited");
}

/// Reload the owners of every path in `event`; failures are logged and swallowed.
async fn handle_event(state: &Weak<Mutex<RegistryState>>, event: Event, reload_events: ReloadEvents) {
    if event.need_rescan() {
        warn!(paths = ?event.paths, "Watch events overflowed, some changes may be missed");
        return;
    }
    if !reload_events.accepts(&event.kind) {
        return;
    }

    let mut seen: Vec<&PathBuf> = Vec::new();
    for path in &event.paths {
        if seen.contains(&path) {
            continue;
        }
        seen.push(path);

        let owner = match state.upgrade() {
            Some(state) => {
                let mut guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let owner = guard.owners.get(path).and_then(Weak::upgrade);
                if owner.is_none() && prune_owner(&mut guard, path) {
                    debug!(path = %path.display(), "Dropped registration of a released aggregation");
                }
                owner
            }
            None => return,
        };
        let Some(owner) = owner else { continue };

        info!(path = %path.display(), kind = ?event.kind, "Aggregation file changed, reloading");
        // Run on its own task so a panicking reload cannot end the loop.
        let reload = tokio::spawn(async move { owner.on_config_changed().await });
        match reload.await {
            Ok(Ok(())) => info!(path = %path.display(), "Aggregation reloaded"),
            Ok(Err(e)) => error!(
                path = %path.display(),
                error = %e,
                "Aggregation reload failed, keeping previous state"
            ),
            Err(e) => error!(path = %path.display(), error = %e, "Aggregation reload panicked"),
        }
    }
}
