//! File-system side of attachment management.
//!
//! # Responsibility
//! - Place and remove attachment PDFs under a single upload root.
//! - Run deferred removals on a background worker with bounded retry.
//! - Reconcile the upload tree against stored attachment rows.
//!
//! # Invariants
//! - No file outside the upload root is ever removed.
//! - An existing file is never overwritten.
//! - File writes are not covered by database transactions; an orphaned file
//!   after a rollback is collected by [`orphan_sweep::sweep_orphans`].

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub mod attachment_store;
pub mod deletion_queue;
pub mod orphan_sweep;

pub use attachment_store::{is_within_root, AttachmentStore};
pub use deletion_queue::{DeletionConfig, DeletionHandle, DeletionQueue, DeletionSnapshot};
pub use orphan_sweep::{sweep_orphans, SweepMode, SweepReport};

pub type StoreResult<T> = Result<T, StoreError>;

/// Attachment file-system error.
#[derive(Debug)]
pub enum StoreError {
    /// Computed attachment path is already taken.
    AlreadyExists(PathBuf),
    Io { path: PathBuf, source: io::Error },
    /// Path resolves outside the upload root (or to the root itself).
    OutsideRoot(PathBuf),
    /// Committee number cannot be used as a file-name component.
    InvalidName(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "already_exists",
            Self::Io { .. } => "io",
            Self::OutsideRoot(_) => "outside_root",
            Self::InvalidName(_) => "invalid_name",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(path) => {
                write!(f, "attachment path already exists: {}", path.display())
            }
            Self::Io { path, source } => write!(f, "i/o error on {}: {source}", path.display()),
            Self::OutsideRoot(path) => {
                write!(f, "path is outside the upload root: {}", path.display())
            }
            Self::InvalidName(name) => write!(f, "invalid committee number for file name: `{name}`"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::AlreadyExists(_) | Self::OutsideRoot(_) | Self::InvalidName(_) => None,
        }
    }
}
