//! MIME type values and the guessing service used to classify template files.
//!
//! Guessing for templates differs from ordinary content-type detection: a
//! desktop entry may name the type it creates (`MimeType=`) or point at the
//! real template payload (`URL=`), and a directory target is recognized as
//! `inode/directory`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::desktop_entry::{DESKTOP_SUFFIX, DesktopEntry};

/// Well-known type of directory templates.
pub const INODE_DIRECTORY: &str = "inode/directory";

/// Type assigned to application launcher desktop entries.
pub const APPLICATION_DESKTOP: &str = "application/x-desktop";

/// A MIME type name such as `text/plain`.
///
/// Cheap to clone; equality and hashing are by name. This is the primary key
/// of the template registry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MimeType(Arc<str>);

impl MimeType {
    /// Create a MIME type from its name.
    pub fn from_name(name: &str) -> Self {
        Self(Arc::from(name.trim()))
    }

    /// The `inode/directory` type.
    pub fn inode_directory() -> Self {
        Self::from_name(INODE_DIRECTORY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_directory(&self) -> bool {
        &*self.0 == INODE_DIRECTORY
    }

    /// Generic icon name per the freedesktop icon naming convention.
    ///
    /// `text/plain` becomes `text-plain`.
    pub fn icon_name(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MimeType({})", self.0)
    }
}

impl From<&str> for MimeType {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Service that determines which MIME type a template file creates.
///
/// Implementations perform I/O and are always called without the registry
/// lock held.
pub trait MimeGuesser: Send + Sync {
    /// Guess the type for `path`; `is_desktop_entry` hints that the file is
    /// a desktop entry that may carry `MimeType` or `URL` keys.
    fn guess(&self, path: &Path, is_desktop_entry: bool) -> Option<MimeType>;
}

/// Guesser backed by desktop-entry parsing, file names and file contents.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMimeGuesser;

impl SystemMimeGuesser {
    pub fn new() -> Self {
        Self
    }
}

impl MimeGuesser for SystemMimeGuesser {
    fn guess(&self, path: &Path, is_desktop_entry: bool) -> Option<MimeType> {
        let mut target = path.to_path_buf();

        if is_desktop_entry {
            match DesktopEntry::load(path) {
                Ok(entry) => {
                    if let Some(name) = entry.string("MimeType").and_then(first_mime_item) {
                        return Some(MimeType::from_name(&name));
                    }
                    if let Some(url) = entry.string("URL") {
                        let base = path.parent().unwrap_or_else(|| Path::new("/"));
                        target = resolve_url(base, &url);
                    }
                }
                Err(e) => {
                    crate::debug_event!("mime", "unreadable entry", "{}: {e}", path.display());
                }
            }
        }

        let basename = target.file_name()?.to_string_lossy().into_owned();
        if basename.ends_with(DESKTOP_SUFFIX) {
            // A template that is itself a launcher; only Application entries count.
            if let Ok(entry) = DesktopEntry::load(&target) {
                if entry.string("Type").as_deref() == Some("Application") {
                    return Some(MimeType::from_name(APPLICATION_DESKTOP));
                }
            }
        } else if let Some(guess) = mime_guess::from_path(&basename).first() {
            return Some(MimeType::from_name(guess.essence_str()));
        }

        let metadata = std::fs::metadata(&target).ok()?;
        if metadata.is_dir() {
            return Some(MimeType::inode_directory());
        }
        if metadata.is_file() {
            if let Ok(Some(kind)) = infer::get_from_path(&target) {
                return Some(MimeType::from_name(kind.mime_type()));
            }
        }
        None
    }
}

/// First non-empty item of a `;`-separated MIME list.
fn first_mime_item(value: String) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find(|item| !item.is_empty())
        .map(str::to_string)
}

/// Resolve a desktop entry `URL` value to a local path.
///
/// Absolute paths and `file://` URLs are taken as is; anything else is
/// relative to `base`.
pub fn resolve_url(base: &Path, url: &str) -> PathBuf {
    let url = url.strip_prefix("file://").unwrap_or(url);
    if url.starts_with('/') {
        PathBuf::from(url)
    } else {
        base.join(url)
    }
}
