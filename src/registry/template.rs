//! Template handles and their resolved fields.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::mime::MimeType;

/// Icon named by a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Icon {
    /// Themed icon name, e.g. `x-office-document`.
    Named(String),
    /// Absolute path to an icon file.
    File(PathBuf),
}

impl Icon {
    /// Interpret a desktop entry `Icon=` value.
    pub fn from_value(value: &str) -> Self {
        if value.starts_with('/') {
            Icon::File(PathBuf::from(value))
        } else {
            Icon::Named(value.to_string())
        }
    }
}

/// Fields folded from a template's contributors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub target_file: Option<PathBuf>,
    pub icon: Option<Icon>,
    pub command: Option<String>,
    pub label: Option<String>,
    pub prompt: Option<String>,
}

/// Shared record behind every [`Template`] handle.
///
/// `resolved` is only written while the registry lock is held.
pub(crate) struct TemplateRecord {
    mime_type: MimeType,
    resolved: RwLock<Resolved>,
    revision: AtomicU64,
}

impl TemplateRecord {
    pub(crate) fn new(mime_type: MimeType) -> Arc<Self> {
        Arc::new(Self {
            mime_type,
            resolved: RwLock::new(Resolved::default()),
            revision: AtomicU64::new(0),
        })
    }

    pub(crate) fn mime_type(&self) -> &MimeType {
        &self.mime_type
    }

    pub(crate) fn store(&self, resolved: Resolved) {
        *self.resolved.write() = resolved;
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

/// File name proposed by a template, with the length of its stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName {
    /// Base name of the template's target file, e.g. `Untitled.odt`.
    pub name: String,
    /// Number of characters before the final `.`; the whole name when
    /// there is no suffix. Lets a UI preselect only the stem.
    pub stem_len: usize,
}

impl TemplateName {
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let stem_len = match name.rfind('.') {
            Some(point) => name[..point].chars().count(),
            None => name.chars().count(),
        };
        Some(Self { name, stem_len })
    }
}

/// A MIME-type-keyed template merged from one or more template files.
///
/// Cheap to clone. A handle stays readable after the registry dropped the
/// template; it then keeps the last resolved values.
#[derive(Clone)]
pub struct Template {
    record: Arc<TemplateRecord>,
}

impl Template {
    pub(crate) fn from_record(record: Arc<TemplateRecord>) -> Self {
        Self { record }
    }

    pub fn mime_type(&self) -> &MimeType {
        &self.record.mime_type
    }

    /// Name for the new file, taken from the resolved target file.
    pub fn name(&self) -> Option<TemplateName> {
        let resolved = self.record.resolved.read();
        resolved.target_file.as_deref().and_then(TemplateName::from_path)
    }

    /// The file whose contents seed a new file, if any.
    pub fn target_file(&self) -> Option<PathBuf> {
        self.record.resolved.read().target_file.clone()
    }

    /// Icon declared by a contributor, or the generic icon of the MIME type.
    pub fn icon(&self) -> Icon {
        self.record
            .resolved
            .read()
            .icon
            .clone()
            .unwrap_or_else(|| Icon::Named(self.record.mime_type.icon_name()))
    }

    /// Command line used to open created files instead of the default handler.
    pub fn command(&self) -> Option<String> {
        self.record.resolved.read().command.clone()
    }

    /// Menu label.
    pub fn label(&self) -> Option<String> {
        self.record.resolved.read().label.clone()
    }

    /// Prompt for the name entry.
    pub fn prompt(&self) -> Option<String> {
        self.record.resolved.read().prompt.clone()
    }

    /// Whether the template creates a directory (`inode/directory`).
    pub fn is_directory_template(&self) -> bool {
        self.record.mime_type.is_directory()
    }

    /// Number of times the fields were resolved from the contributors.
    pub fn revision(&self) -> u64 {
        self.record.revision.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> Resolved {
        self.record.resolved.read().clone()
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for Template {}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self.record.resolved.read();
        f.debug_struct("Template")
            .field("mime_type", &self.record.mime_type)
            .field("target_file", &resolved.target_file)
            .field("label", &resolved.label)
            .field("revision", &self.revision())
            .finish()
    }
}
