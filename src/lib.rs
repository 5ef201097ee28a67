pub mod codec;
pub mod config;
pub mod remote;
pub mod sync;
pub mod watcher;

pub use codec::{Codec, CodecError, SourceFormat, Theme};
pub use config::{ConfigError, Settings};
pub use remote::{HttpNoteStore, MemoryNoteStore, NoteStore, StoreError};
pub use sync::{EventProcessor, FsEvent, MetadataIndex, Reconciler, SyncError};
pub use watcher::{start_watcher, WatchError};
