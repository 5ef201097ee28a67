use std::path::{Path, PathBuf};

use super::SyncError;

/// Filesystem change kinds the event processor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    /// A file opened for writing was closed
    ClosedWrite,
    Deleted,
}

/// One change inside the workspace, as delivered by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub is_dir: bool,
    /// Directory containing the entry
    pub parent: PathBuf,
    /// File or directory name
    pub name: String,
}

impl FsEvent {
    /// Build an event from a full path; `None` for paths without a UTF-8 name.
    pub fn from_path(kind: FsEventKind, is_dir: bool, path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let parent = path.parent()?.to_path_buf();
        Some(Self {
            kind,
            is_dir,
            parent,
            name,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.parent.join(&self.name)
    }
}

/// Editor scratch files: dotfiles, `foo~` backups, and vim's `4913` probe.
pub fn is_transient(name: &str) -> bool {
    name.starts_with('.') || name.ends_with('~') || name == "4913"
}

/// Split `name` on its last dot into `(title, extension)`.
///
/// Titles may contain dots (`v1.2 notes.md` -> `v1.2 notes`, `md`); a name
/// without an extension is rejected.
pub fn split_file_name(name: &str) -> Result<(&str, &str), SyncError> {
    match name.rsplit_once('.') {
        Some((title, extension)) if !title.is_empty() && !extension.is_empty() => {
            Ok((title, extension))
        }
        _ => Err(SyncError::InvalidFileName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_names() {
        assert!(is_transient(".ideas.md.swp"));
        assert!(is_transient("ideas.md~"));
        assert!(is_transient("4913"));
        assert!(!is_transient("ideas.md"));
        assert!(!is_transient("49130.txt"));
    }

    #[test]
    fn test_split_on_last_dot() {
        assert_eq!(split_file_name("ideas.md").unwrap(), ("ideas", "md"));
        assert_eq!(split_file_name("v1.2 notes.txt").unwrap(), ("v1.2 notes", "txt"));
    }

    #[test]
    fn test_split_rejects_missing_extension() {
        for name in ["README", "notes.", ".md"] {
            assert!(matches!(split_file_name(name), Err(SyncError::InvalidFileName(_))));
        }
    }

    #[test]
    fn test_event_from_path() {
        let event = FsEvent::from_path(
            FsEventKind::Created,
            false,
            Path::new("/ws/Personal/ideas.md"),
        )
        .unwrap();
        assert_eq!(event.parent, PathBuf::from("/ws/Personal"));
        assert_eq!(event.name, "ideas.md");
        assert_eq!(event.path(), PathBuf::from("/ws/Personal/ideas.md"));
    }
}
