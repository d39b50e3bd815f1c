//! Directory index: turns listings and watch events into registry changes.
//!
//! MIME guessing and desktop entry parsing run without the registry lock;
//! only the resulting changes are applied under it. Because of that, every
//! lookup done before the unlocked phase is repeated afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::Shared;
use super::state::DirId;
use crate::desktop_entry::DESKTOP_SUFFIX;
use crate::error::TemplateError;
use crate::mime::MimeType;
use crate::watcher::WatchEvent;

/// A file reported by the initial listing of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub path: PathBuf,
    pub is_desktop_entry: bool,
}

impl ListedFile {
    pub fn new(path: PathBuf) -> Self {
        let is_desktop_entry = is_desktop_entry(&path);
        Self {
            path,
            is_desktop_entry,
        }
    }
}

pub(crate) fn is_desktop_entry(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(DESKTOP_SUFFIX))
}

impl Shared {
    /// Route one watch event of directory `dir`.
    pub(crate) fn dispatch(&self, dir: DirId, event: WatchEvent) {
        match event {
            WatchEvent::Created(path) => self.on_created(dir, &path),
            WatchEvent::Modified(path) => self.on_modified(dir, &path),
            WatchEvent::Deleted(path) => self.on_deleted(dir, &path),
            WatchEvent::Other => {}
        }
    }

    /// Register a new file of directory `dir`.
    pub(crate) fn on_created(&self, dir: DirId, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let candidate = {
            let state = self.state.lock();
            let Some(directory) = state.dirs.get(dir) else {
                tracing::warn!("[index] event for unknown directory #{dir}");
                return;
            };
            if state.find_in_dir(dir, name).is_some() {
                crate::debug_event!("index", "duplicate file", "{}", path.display());
                return;
            }
            // Keep the path based on the directory path.
            directory.path.join(name)
        };

        let desktop = is_desktop_entry(&candidate);
        let Some(mime_type) = self.guesser.guess(&candidate, desktop) else {
            let err = TemplateError::MimeUnresolved { path: candidate };
            tracing::warn!("[index] {err}, ignoring it");
            return;
        };

        let changed = {
            let mut state = self.state.lock();
            if state.dirs.len() <= dir || state.find_in_dir(dir, name).is_some() {
                None
            } else {
                crate::debug_event!("index", "added", "{} ({mime_type})", candidate.display());
                Some(state.attach(dir, candidate, desktop, mime_type))
            }
        };
        if let Some(mime_type) = changed {
            self.refresh(&mime_type);
        }
    }

    /// Re-resolve the template of a changed desktop entry.
    ///
    /// Plain files carry no metadata, so their changes are ignored.
    pub(crate) fn on_modified(&self, dir: DirId, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let changed = {
            let mut state = self.state.lock();
            let Some(id) = state.find_in_dir(dir, name) else {
                tracing::warn!("[index] change for unknown file {}", path.display());
                return;
            };
            let entry = state.entry(id);
            if !entry.is_desktop_entry {
                return;
            }
            let mime_type = entry.template.mime_type().clone();
            state.touch(&mime_type);
            mime_type
        };
        self.refresh(&changed);
    }

    /// Forget a removed file of directory `dir`.
    pub(crate) fn on_deleted(&self, dir: DirId, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let changed = {
            let mut state = self.state.lock();
            // An unknown file is already gone from the registry.
            let Some(id) = state.find_in_dir(dir, name) else {
                return;
            };
            crate::debug_event!("index", "removed", "{}", path.display());
            state.detach(id)
        };
        if let Some(mime_type) = changed {
            self.refresh(&mime_type);
        }
    }

    /// Apply the result of the initial listing of directory `dir`.
    pub(crate) fn apply_listing(&self, dir: DirId, files: Vec<ListedFile>) {
        let candidates: Vec<ListedFile> = {
            let state = self.state.lock();
            let Some(directory) = state.dirs.get(dir) else {
                return;
            };
            files
                .into_iter()
                .filter_map(|file| {
                    let name = file.path.file_name()?;
                    if state.find_in_dir(dir, name).is_some() {
                        return None;
                    }
                    Some(ListedFile {
                        path: directory.path.join(name),
                        is_desktop_entry: file.is_desktop_entry,
                    })
                })
                .collect()
        };

        let guessed: Vec<(ListedFile, MimeType)> = candidates
            .into_iter()
            .filter_map(|file| match self.guesser.guess(&file.path, file.is_desktop_entry) {
                Some(mime_type) => Some((file, mime_type)),
                None => {
                    let err = TemplateError::MimeUnresolved { path: file.path };
                    crate::debug_event!("index", "skipped", "{err}");
                    None
                }
            })
            .collect();

        let mut changed: Vec<MimeType> = Vec::new();
        {
            let mut state = self.state.lock();
            if state.dirs.len() <= dir {
                return;
            }
            let mut seen = HashSet::new();
            for (file, mime_type) in guessed {
                let Some(name) = file.path.file_name() else {
                    continue;
                };
                if state.find_in_dir(dir, name).is_some() {
                    continue;
                }
                let mime_type = state.attach(dir, file.path, file.is_desktop_entry, mime_type);
                if seen.insert(mime_type.clone()) {
                    changed.push(mime_type);
                }
            }
        }
        crate::debug_event!("index", "listed", "directory #{dir}: {} templates touched", changed.len());
        for mime_type in changed {
            self.refresh(&mime_type);
        }
    }

    /// Resolve the fields of `mime_type` from its current chain.
    pub(crate) fn refresh(&self, mime_type: &MimeType) {
        let Some(plan) = self.state.lock().fold_plan(mime_type) else {
            return;
        };
        let outcome = plan.resolve();
        if !self.state.lock().apply_fold(outcome) {
            crate::debug_event!("merge", "superseded fold", "{mime_type}");
        }
    }
}
