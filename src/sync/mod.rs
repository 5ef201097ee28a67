//! Sync engine: startup reconciliation plus live event handling, both driven
//! through the [`MetadataIndex`].

mod error;
pub mod events;
mod index;
mod processor;
mod reconcile;

use std::time::Duration;

pub use error::SyncError;
pub use events::{FsEvent, FsEventKind};
pub use index::MetadataIndex;
pub use processor::{EventOutcome, EventProcessor, RemoteOp, DEFAULT_DELETE_GRACE};
pub use reconcile::{ReconcileReport, Reconciler};

/// Upper bound for a single remote call unless configured otherwise
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
