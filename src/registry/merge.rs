//! Merge engine: priority chains and field resolution.
//!
//! Every template keeps its contributors in a chain ordered by
//! `(directory priority, desktop entry before plain file)`. Resolution folds
//! the chain from the lowest-priority contributor to the head, so that the
//! most relevant desktop entry defining a field wins.
//!
//! Resolution reads files. It is split in three steps so that no I/O happens
//! under the registry lock: [`RegistryState::fold_plan`] snapshots the chain,
//! [`FoldPlan::resolve`] parses the contributors, and
//! [`RegistryState::apply_fold`] stores the result unless the chain changed
//! in the meantime.

use std::path::{Path, PathBuf};

use super::state::{DirId, EntryId, RegistryState, corruption};
use super::template::{Icon, Resolved};
use crate::desktop_entry::{DesktopEntry, DesktopEntryError};
use crate::error::TemplateError;
use crate::mime::{MimeType, resolve_url};

impl RegistryState {
    /// Position at which an entry from `dir` should enter `chain`.
    ///
    /// Walks the chain once while a directory cursor moves from the
    /// highest-priority directory downwards; both sequences are already
    /// priority-ordered, so the cursor never has to move back. The new entry
    /// goes before the first element that does not strictly outrank it.
    pub(crate) fn insertion_point(
        &self,
        chain: &[EntryId],
        dir: DirId,
        is_desktop_entry: bool,
    ) -> usize {
        let mut cursor: DirId = 0;
        for (pos, id) in chain.iter().enumerate() {
            let next = self.entry(*id);
            while cursor < self.dirs.len() && cursor != dir && cursor != next.dir {
                cursor += 1;
            }
            if cursor >= self.dirs.len() {
                corruption("chain entry outside of the directory list");
            }
            if cursor == dir {
                // Plain files sort after the desktop entries of their directory.
                let behind_desktop_entry =
                    next.dir == dir && !is_desktop_entry && next.is_desktop_entry;
                if !behind_desktop_entry {
                    return pos;
                }
            }
        }
        chain.len()
    }

    /// Insert an attached entry into the chain of `mime_type`.
    pub(crate) fn insert_sorted(&mut self, mime_type: &MimeType, id: EntryId) {
        let (dir, is_desktop_entry) = {
            let entry = self.entry(id);
            (entry.dir, entry.is_desktop_entry)
        };
        let pos = match self.templates.get(mime_type) {
            Some(slot) => self.insertion_point(&slot.chain, dir, is_desktop_entry),
            None => corruption("inserting into a missing template"),
        };
        let generation = self.next_generation();
        if let Some(slot) = self.templates.get_mut(mime_type) {
            slot.chain.insert(pos, id);
            slot.generation = generation;
        }
    }

    /// Splice `id` out of the chain of `mime_type`.
    ///
    /// Drops the template from the registry when the chain becomes empty and
    /// returns `None`; otherwise returns the MIME type to resolve again.
    pub(crate) fn remove_from_chain(&mut self, mime_type: &MimeType, id: EntryId) -> Option<MimeType> {
        let generation = self.next_generation();
        let Some(slot) = self.templates.get_mut(mime_type) else {
            corruption("entry references a missing template");
        };
        let Some(pos) = slot.chain.iter().position(|e| *e == id) else {
            corruption("entry being freed is missing from its template");
        };
        slot.chain.remove(pos);
        if slot.chain.is_empty() {
            self.templates.shift_remove(mime_type);
            crate::debug_event!("merge", "template dropped", "{mime_type}");
            return None;
        }
        slot.generation = generation;
        Some(mime_type.clone())
    }

    /// Snapshot the inputs needed to resolve `mime_type`.
    pub(crate) fn fold_plan(&self, mime_type: &MimeType) -> Option<FoldPlan> {
        let slot = self.templates.get(mime_type)?;
        let contributors = slot
            .chain
            .iter()
            .map(|id| {
                let entry = self.entry(*id);
                Contributor {
                    id: *id,
                    path: entry.path.clone(),
                    dir_path: self
                        .dirs
                        .get(entry.dir)
                        .map(|d| d.path.clone())
                        .unwrap_or_default(),
                    is_desktop_entry: entry.is_desktop_entry,
                }
            })
            .collect();
        Some(FoldPlan {
            mime_type: mime_type.clone(),
            generation: slot.generation,
            contributors,
        })
    }

    /// Store a fold result. Returns false when the chain changed since the
    /// plan was taken; the newer change brings its own fold.
    pub(crate) fn apply_fold(&mut self, outcome: FoldOutcome) -> bool {
        let Some(slot) = self.templates.get(&outcome.mime_type) else {
            return true;
        };
        if slot.generation != outcome.generation {
            return false;
        }
        let record = slot.record.clone();
        for (id, inactive) in outcome.inactive {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.inactive = inactive;
            }
        }
        record.store(outcome.resolved);
        true
    }
}

/// One contributor as seen by a fold.
#[derive(Debug, Clone)]
pub(crate) struct Contributor {
    pub id: EntryId,
    pub path: PathBuf,
    pub dir_path: PathBuf,
    pub is_desktop_entry: bool,
}

/// Chain snapshot taken under the registry lock.
#[derive(Debug, Clone)]
pub(crate) struct FoldPlan {
    pub mime_type: MimeType,
    pub generation: u64,
    /// Highest priority first.
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoldOutcome {
    pub mime_type: MimeType,
    pub generation: u64,
    pub resolved: Resolved,
    /// Hidden flags of the desktop entries that could be read.
    pub inactive: Vec<(EntryId, bool)>,
}

impl FoldPlan {
    /// Resolve the fields by reading the contributors from disk.
    pub(crate) fn resolve(&self) -> FoldOutcome {
        self.resolve_with(DesktopEntry::load)
    }

    /// Resolve with a custom desktop entry loader.
    pub(crate) fn resolve_with<F>(&self, mut load: F) -> FoldOutcome
    where
        F: FnMut(&Path) -> Result<DesktopEntry, DesktopEntryError>,
    {
        let mut resolved = Resolved::default();
        let mut inactive = Vec::new();

        // Least relevant contributor first.
        for contributor in self.contributors.iter().rev() {
            if !contributor.is_desktop_entry {
                if resolved.target_file.is_none() {
                    resolved.target_file = Some(contributor.path.clone());
                }
                continue;
            }

            let entry = match load(&contributor.path) {
                Ok(entry) => entry,
                Err(e) => {
                    let err = TemplateError::MalformedDesktopEntry {
                        path: contributor.path.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("[merge] {err}");
                    continue;
                }
            };

            let hidden = entry.boolean("Hidden");
            inactive.push((contributor.id, hidden));
            if hidden {
                continue;
            }
            if let Some(url) = entry.string("URL") {
                resolved.target_file = Some(resolve_url(&contributor.dir_path, &url));
            }
            if let Some(icon) = entry.string("Icon") {
                resolved.icon = Some(Icon::from_value(&icon));
            }
            if let Some(command) = entry.string("Exec") {
                resolved.command = Some(command);
            }
            if let Some(label) = entry.locale_string("Name") {
                resolved.label = Some(label);
            }
            if let Some(prompt) = entry.locale_string("Comment") {
                resolved.prompt = Some(prompt);
            }
        }

        FoldOutcome {
            mime_type: self.mime_type.clone(),
            generation: self.generation,
            resolved,
            inactive,
        }
    }
}
