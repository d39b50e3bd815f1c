//! Directory listing and live watching for template directories.
//!
//! # Architecture
//!
//! ```text
//! WatchManager
//!   - one thread per directory
//!       1. initial listing (walkdir) -> Shared::apply_listing
//!       2. watch events (notify -> crossbeam channel) -> Shared::dispatch
//!   - one notify::RecommendedWatcher per directory (optional)
//! ```
//!
//! The watch is established before the listing starts, and queued events
//! are applied only after the listing, so changes that race the listing
//! are never lost or reordered. Events of one directory are applied in
//! delivery order; nothing is ordered across directories.

mod error;
mod event;

pub use error::WatchError;
pub use event::WatchEvent;

use event::translate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, select};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::WalkDir;

use crate::error::TemplateError;
use crate::locations::TemplateLocation;
use crate::registry::{DirId, ListedFile, Shared};

/// Background listing and watching of every registry directory.
pub(crate) struct WatchManager {
    cancelled: Arc<AtomicBool>,
    directories: Vec<DirectoryWorker>,
}

struct DirectoryWorker {
    watcher: Option<RecommendedWatcher>,
    /// Dropped to stop the worker.
    shutdown: Option<Sender<()>>,
    /// Disconnects once the initial listing has been applied.
    listed: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl WatchManager {
    /// Start listing (and, with `watch`, watching) each of `locations`.
    ///
    /// `locations[i]` is directory `i` of the registry.
    pub(crate) fn start(shared: &Arc<Shared>, locations: &[TemplateLocation], watch: bool) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let directories = locations
            .iter()
            .enumerate()
            .map(|(dir, location)| {
                DirectoryWorker::spawn(shared, dir, &location.path, watch, &cancelled)
            })
            .collect();
        Self {
            cancelled,
            directories,
        }
    }

    /// Block until every initial listing has been applied.
    pub(crate) fn wait_for_listings(&self) {
        for worker in &self.directories {
            // Returns once the sender side is gone.
            let _ = worker.listed.recv();
        }
    }

    /// Detach every watch and stop every worker.
    pub(crate) fn shutdown(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        for worker in &mut self.directories {
            worker.watcher = None;
            worker.shutdown = None;
        }
        for worker in &mut self.directories {
            let panicked = worker.handle.take().is_some_and(|h| h.join().is_err());
            if panicked {
                tracing::error!("[watcher] directory worker panicked");
            }
        }
        crate::debug_event!("watcher", "stopped", "{} directories", self.directories.len());
    }
}

impl DirectoryWorker {
    fn spawn(
        shared: &Arc<Shared>,
        dir: DirId,
        path: &Path,
        watch: bool,
        cancelled: &Arc<AtomicBool>,
    ) -> Self {
        let (listed_tx, listed) = crossbeam_channel::bounded::<()>(0);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let (watcher, events) = if watch {
            match watch_directory(path) {
                Ok((watcher, events)) => (Some(watcher), Some(events)),
                Err(e) => {
                    let err = TemplateError::WatchUnavailable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    };
                    if path.exists() {
                        tracing::warn!("[watcher] {err}");
                    } else {
                        crate::debug_event!("watcher", "not watching", "{err}");
                    }
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let shared = Arc::clone(shared);
        let cancelled = Arc::clone(cancelled);
        let root = path.to_path_buf();
        let spawned = std::thread::Builder::new()
            .name(format!("templates-dir-{dir}"))
            .spawn(move || {
                let files = list_directory(&root, &cancelled);
                if !cancelled.load(Ordering::SeqCst) {
                    shared.apply_listing(dir, files);
                }
                drop(listed_tx);

                if let Some(events) = events {
                    run_events(&shared, dir, &events, &shutdown_rx, &cancelled);
                }
            });

        let handle = match spawned.map_err(WatchError::from) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("[watcher] {}: {e}", path.display());
                None
            }
        };

        Self {
            watcher,
            shutdown: Some(shutdown_tx),
            listed,
            handle,
        }
    }
}

/// Establish a non-recursive watch on `path`.
fn watch_directory(path: &Path) -> Result<(RecommendedWatcher, Receiver<WatchEvent>), WatchError> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let dir = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for change in translate(&dir, event) {
                if tx.send(change).is_err() {
                    return;
                }
            }
        }
        Err(e) => tracing::error!("[watcher] file watch error: {e}"),
    })?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::PathWatchFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    crate::debug_event!("watcher", "watching", "{}", path.display());
    Ok((watcher, rx))
}

/// Direct children of `root`. A missing directory lists as empty.
fn list_directory(root: &Path, cancelled: &AtomicBool) -> Vec<ListedFile> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        match entry {
            Ok(entry) => files.push(ListedFile::new(entry.into_path())),
            Err(e) => {
                let missing = e
                    .io_error()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
                if missing {
                    crate::debug_event!("watcher", "missing directory", "{}", root.display());
                } else {
                    tracing::warn!("[watcher] failed to list {}: {e}", root.display());
                }
            }
        }
    }
    files
}

fn run_events(
    shared: &Shared,
    dir: DirId,
    events: &Receiver<WatchEvent>,
    shutdown: &Receiver<()>,
    cancelled: &AtomicBool,
) {
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    shared.dispatch(dir, event);
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
}
