//! Workspace watcher
//!
//! Translates `notify` events for the recursively watched workspace root into
//! [`FsEvent`]s and pushes them into the event processor's bounded queue.

use std::path::Path;

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::sync::{FsEvent, FsEventKind};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to start watcher: {0}")]
    Init(#[from] notify::Error),
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Map one `notify` event onto the events the processor understands.
///
/// Renames are split: the old name is a deletion, the new one a completed
/// write (or a new directory).
pub fn translate(event: &Event) -> Vec<FsEvent> {
    event
        .paths
        .iter()
        .filter_map(|path| {
            let (kind, is_dir) = classify(&event.kind, path)?;
            FsEvent::from_path(kind, is_dir, path)
        })
        .collect()
}

fn classify(kind: &EventKind, path: &Path) -> Option<(FsEventKind, bool)> {
    match kind {
        EventKind::Create(CreateKind::Folder) => Some((FsEventKind::Created, true)),
        EventKind::Create(CreateKind::File) => Some((FsEventKind::Created, false)),
        EventKind::Create(_) => Some((FsEventKind::Created, path.is_dir())),

        #[cfg(target_os = "linux")]
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            Some((FsEventKind::ClosedWrite, false))
        }
        // No close-after-write notification outside inotify
        #[cfg(not(target_os = "linux"))]
        EventKind::Modify(ModifyKind::Data(_)) => Some((FsEventKind::ClosedWrite, false)),

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some((FsEventKind::Deleted, false)),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(arrived(path)),
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            if path.exists() {
                Some(arrived(path))
            } else {
                Some((FsEventKind::Deleted, false))
            }
        }

        EventKind::Remove(RemoveKind::Folder) => Some((FsEventKind::Deleted, true)),
        EventKind::Remove(_) => Some((FsEventKind::Deleted, false)),
        _ => None,
    }
}

fn arrived(path: &Path) -> (FsEventKind, bool) {
    if path.is_dir() {
        (FsEventKind::Created, true)
    } else {
        (FsEventKind::ClosedWrite, false)
    }
}

/// Watch `root` recursively, sending translated events to `tx`.
///
/// The returned watcher must be kept alive for events to keep flowing. The
/// callback runs on the watcher's own thread and blocks while the queue is
/// full.
pub fn start_watcher(root: &Path, tx: mpsc::Sender<FsEvent>) -> Result<RecommendedWatcher, WatchError> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("[watcher] Watch error: {}", e);
                    return;
                }
            };

            for fs_event in translate(&event) {
                log::debug!("[watcher] {:?} {}", fs_event.kind, fs_event.path().display());
                if tx.blocking_send(fs_event).is_err() {
                    log::debug!("[watcher] Event queue closed, dropping event");
                    return;
                }
            }
        },
        Config::default(),
    )?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| WatchError::Watch {
            path: root.display().to_string(),
            source,
        })?;

    log::info!("[watcher] Watching {}", root.display());
    Ok(watcher)
}
