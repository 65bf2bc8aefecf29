//! Project file watcher feeding the build driver's recompile trigger.
//!
//! Watches the project directory recursively, drops changes under
//! `node_modules`, the output directory and hidden paths, and turns
//! everything else into a trigger. Bursts collapse twice: the watcher
//! debounces repeated events for one path, and the driver folds pending
//! triggers into a single follow-up compile.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use skein_bundler::cache::TRACKED_FILES;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::{CliError, Result};

/// Debounce window for repeated events on one path.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Directory names ignored at any depth.
const IGNORED_DIRS: &[&str] = &["node_modules"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over a project root.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`. Paths matching `ignore_patterns` (directory
    /// prefixes relative to `root`, or `*.ext` suffixes) never produce changes.
    pub fn new(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(100);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("file watcher error: {e}");
                    return;
                }
            };

            for path in &event.paths {
                if should_ignore(path, &watch_root, &ignore_patterns) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // A full queue already holds a change that will trigger a compile.
                let _ = tx.try_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether a change at `path` should be ignored.
///
/// Directory patterns only match from the root, so an output directory named
/// `build` does not hide `src/build`. Hidden files are ignored unless they are
/// build-affecting config files such as `.postcssrc`.
pub fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };

    let in_ignored_dir = rel_path
        .components()
        .any(|component| IGNORED_DIRS.iter().any(|dir| component.as_os_str() == *dir));
    if in_ignored_dir {
        return true;
    }

    let path_str = rel_path.to_string_lossy();
    for pattern in ignore_patterns {
        let matched = match pattern.strip_prefix('*') {
            Some(ext) => path_str.ends_with(ext),
            None => rel_path.starts_with(pattern),
        };
        if matched {
            return true;
        }
    }

    let tracked = rel_path
        .to_str()
        .is_some_and(|name| TRACKED_FILES.contains(&name));
    if tracked {
        return false;
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

/// A watcher wired to a driver trigger.
pub struct WatchSession {
    watcher: Option<FileWatcher>,
    task: JoinHandle<()>,
}

impl WatchSession {
    /// Watch `root` and send a recompile request for every relevant change.
    pub fn start(root: PathBuf, ignore_patterns: Vec<String>, trigger: mpsc::Sender<()>) -> Result<Self> {
        let (watcher, changes) = FileWatcher::new(root, ignore_patterns, DEBOUNCE)?;
        tracing::debug!(root = %watcher.root().display(), "watching for changes");
        let task = tokio::spawn(forward(changes, trigger));
        Ok(Self {
            watcher: Some(watcher),
            task,
        })
    }

    /// Release the watcher and wait for the forwarding task to drain.
    pub async fn stop(mut self) {
        drop(self.watcher.take());
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("watch task ended abnormally: {e}");
        }
    }
}

/// Forward changes as triggers until either side goes away.
pub async fn forward(mut changes: mpsc::Receiver<FileChange>, trigger: mpsc::Sender<()>) {
    while let Some(change) = changes.recv().await {
        tracing::debug!(path = %change.path().display(), "file changed");
        match trigger.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => break,
        }
    }
}

/// Ignore patterns for a project: the build output, when it lives inside
/// the project.
pub fn ignore_patterns(context: &Path, output_path: &Path) -> Vec<String> {
    let mut patterns = Vec::new();
    if let Ok(relative) = output_path.strip_prefix(context) {
        let relative = relative.to_string_lossy();
        if !relative.is_empty() {
            patterns.push(relative.into_owned());
        }
    }
    patterns
}
