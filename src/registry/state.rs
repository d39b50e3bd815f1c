//! Registry-wide data guarded by the single registry lock.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use super::template::{Template, TemplateRecord};
use crate::locations::TemplateLocation;
use crate::mime::MimeType;

/// Position of a directory in the priority list; 0 is the highest priority.
pub type DirId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntryId(pub(crate) u64);

/// A watched template directory.
pub(crate) struct Directory {
    pub path: PathBuf,
    pub user_dir: bool,
    /// Unordered; display order comes from template chains.
    pub entries: Vec<EntryId>,
}

/// A template-defining file inside a watched directory.
pub(crate) struct DirectoryEntry {
    pub path: PathBuf,
    pub is_desktop_entry: bool,
    pub inactive: bool,
    pub dir: DirId,
    pub template: Arc<TemplateRecord>,
}

/// Registry bookkeeping for one template.
pub(crate) struct TemplateSlot {
    pub record: Arc<TemplateRecord>,
    /// Contributors, highest priority first.
    pub chain: Vec<EntryId>,
    /// Stamp of the last change to the fold inputs; stale folds are
    /// discarded. Stamps are unique registry-wide, so a fold planned against
    /// a dropped template never matches one recreated for the same type.
    pub generation: u64,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub dirs: Vec<Directory>,
    pub entries: HashMap<EntryId, DirectoryEntry>,
    pub templates: IndexMap<MimeType, TemplateSlot>,
    next_entry: u64,
    /// Last handed out generation stamp. Survives `clear`.
    last_generation: u64,
}

/// Abort on a broken registry invariant.
///
/// Continuing would leak or double-release shared template records.
#[track_caller]
pub(crate) fn corruption(what: &str) -> ! {
    panic!("template registry corruption: {what}")
}

impl RegistryState {
    pub fn set_directories(&mut self, locations: &[TemplateLocation]) {
        self.dirs = locations
            .iter()
            .map(|location| Directory {
                path: location.path.clone(),
                user_dir: location.user_dir,
                entries: Vec::new(),
            })
            .collect();
    }

    pub fn entry(&self, id: EntryId) -> &DirectoryEntry {
        match self.entries.get(&id) {
            Some(entry) => entry,
            None => corruption("chain references a freed entry"),
        }
    }

    /// Entry of `dir` whose file name is `name`.
    pub fn find_in_dir(&self, dir: DirId, name: &OsStr) -> Option<EntryId> {
        self.dirs.get(dir)?.entries.iter().copied().find(|id| {
            self.entries
                .get(id)
                .and_then(|entry| entry.path.file_name())
                .is_some_and(|entry_name| entry_name == name)
        })
    }

    /// Create an entry for `path` in `dir`, creating its template if needed,
    /// and insert it into the template chain.
    ///
    /// Returns the MIME type whose fields must be resolved again.
    pub fn attach(
        &mut self,
        dir: DirId,
        path: PathBuf,
        is_desktop_entry: bool,
        mime_type: MimeType,
    ) -> MimeType {
        let id = EntryId(self.next_entry);
        self.next_entry += 1;

        let record = match self.templates.get(&mime_type) {
            Some(slot) => slot.record.clone(),
            None => {
                crate::debug_event!("merge", "new template", "{mime_type}");
                let record = TemplateRecord::new(mime_type.clone());
                let generation = self.next_generation();
                self.templates.insert(
                    mime_type.clone(),
                    TemplateSlot {
                        record: record.clone(),
                        chain: Vec::new(),
                        generation,
                    },
                );
                record
            }
        };

        self.entries.insert(
            id,
            DirectoryEntry {
                path,
                is_desktop_entry,
                inactive: false,
                dir,
                template: record,
            },
        );
        match self.dirs.get_mut(dir) {
            Some(directory) => directory.entries.push(id),
            None => corruption("entry attached to an unknown directory"),
        }
        self.insert_sorted(&mime_type, id);
        mime_type
    }

    /// Unlink an entry from its directory and template, then free it.
    ///
    /// Returns the MIME type to resolve again, or `None` when the template
    /// lost its last contributor and was dropped from the registry.
    pub fn detach(&mut self, id: EntryId) -> Option<MimeType> {
        let Some(entry) = self.entries.remove(&id) else {
            corruption("detaching an unknown entry");
        };
        let Some(directory) = self.dirs.get_mut(entry.dir) else {
            corruption("entry belongs to an unknown directory");
        };
        let Some(pos) = directory.entries.iter().position(|e| *e == id) else {
            corruption("entry missing from its directory");
        };
        directory.entries.swap_remove(pos);
        self.remove_from_chain(entry.template.mime_type(), id)
    }

    /// Mark the inputs of a template as changed.
    pub fn touch(&mut self, mime_type: &MimeType) {
        let generation = self.next_generation();
        if let Some(slot) = self.templates.get_mut(mime_type) {
            slot.generation = generation;
        }
    }

    /// A generation stamp no slot has carried before.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    /// Templates whose chain head is active, optionally limited to those
    /// whose head lives in a user directory.
    pub fn list_all(&self, user_only: bool) -> Vec<Template> {
        self.templates
            .values()
            .filter_map(|slot| {
                let head = self.entry(*slot.chain.first()?);
                if head.inactive {
                    return None;
                }
                if user_only && !self.dirs.get(head.dir).is_some_and(|d| d.user_dir) {
                    return None;
                }
                Some(Template::from_record(slot.record.clone()))
            })
            .collect()
    }

    pub fn find(&self, mime_type: &MimeType) -> Option<Template> {
        self.templates
            .get(mime_type)
            .map(|slot| Template::from_record(slot.record.clone()))
    }

    /// Drop everything without resolving any template again.
    pub fn clear(&mut self) {
        for directory in &mut self.dirs {
            directory.entries.clear();
        }
        self.entries.clear();
        self.templates.clear();
        self.dirs.clear();
    }
}
