//! Translation of raw `notify` events into per-directory watch events.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A change to one file of a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    /// Attribute, access and unclassified changes.
    Other,
}

/// Translate a `notify` event observed on `dir`.
///
/// Renames are reported as a deletion of the old name followed by a
/// creation of the new one, so a moved file is re-classified from scratch.
/// Events about `dir` itself are dropped.
pub fn translate(dir: &Path, event: Event) -> Vec<WatchEvent> {
    let Event { kind, paths, .. } = event;
    let paths: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| p.as_path() != dir && p.file_name().is_some())
        .collect();

    match kind {
        EventKind::Create(_) => paths.into_iter().map(WatchEvent::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(WatchEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            paths.into_iter().map(WatchEvent::Modified).collect()
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => paths.into_iter().map(WatchEvent::Deleted).collect(),
            RenameMode::To => paths.into_iter().map(WatchEvent::Created).collect(),
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                let mut events = Vec::with_capacity(2);
                events.extend(paths.next().map(WatchEvent::Deleted));
                events.extend(paths.next().map(WatchEvent::Created));
                events
            }
            // Backends that cannot tell the side of a rename.
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .map(|path| {
                    if path.exists() {
                        WatchEvent::Created(path)
                    } else {
                        WatchEvent::Deleted(path)
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) | EventKind::Access(_) | EventKind::Any | EventKind::Other => {
            vec![WatchEvent::Other]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(p.to_path_buf()))
    }

    #[test]
    fn test_basic_kinds() {
        let dir = Path::new("/t");
        let file = Path::new("/t/a.txt");

        assert_eq!(
            translate(dir, event(EventKind::Create(CreateKind::File), &[file])),
            vec![WatchEvent::Created(file.to_path_buf())]
        );
        assert_eq!(
            translate(dir, event(EventKind::Remove(RemoveKind::Any), &[file])),
            vec![WatchEvent::Deleted(file.to_path_buf())]
        );
        assert_eq!(
            translate(
                dir,
                event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &[file])
            ),
            vec![WatchEvent::Modified(file.to_path_buf())]
        );
        assert_eq!(
            translate(
                dir,
                event(
                    EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                    &[file]
                )
            ),
            vec![WatchEvent::Other]
        );
        assert_eq!(
            translate(dir, event(EventKind::Access(AccessKind::Read), &[file])),
            vec![WatchEvent::Other]
        );
    }

    #[test]
    fn test_rename_becomes_delete_and_create() {
        let dir = Path::new("/t");
        let old = Path::new("/t/old.txt");
        let new = Path::new("/t/new.txt");

        assert_eq!(
            translate(
                dir,
                event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &[old, new])
            ),
            vec![
                WatchEvent::Deleted(old.to_path_buf()),
                WatchEvent::Created(new.to_path_buf()),
            ]
        );
        assert_eq!(
            translate(
                dir,
                event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &[old])
            ),
            vec![WatchEvent::Deleted(old.to_path_buf())]
        );
        assert_eq!(
            translate(
                dir,
                event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &[new])
            ),
            vec![WatchEvent::Created(new.to_path_buf())]
        );
        // Nonexistent path with an ambiguous rename is a removal.
        assert_eq!(
            translate(
                dir,
                event(EventKind::Modify(ModifyKind::Name(RenameMode::Any)), &[old])
            ),
            vec![WatchEvent::Deleted(old.to_path_buf())]
        );
    }

    #[test]
    fn test_directory_itself_is_dropped() {
        let dir = Path::new("/t");
        assert!(translate(dir, event(EventKind::Remove(RemoveKind::Folder), &[dir])).is_empty());
    }
}
