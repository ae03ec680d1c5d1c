//! Physical placement and removal of attachment PDFs.
//!
//! # Responsibility
//! - Compute the stored path of a new attachment and write it exactly once.
//! - Gate every removal on upload-root containment.
//!
//! # Invariants
//! - Layout is `{root}/{save_year}/{no}.{declared_year}.{seq}-{YYYY-MM-DD_hh-mm-ss-AM|PM}.pdf`.
//!   The partition year comes from the save clock, the file-name year from the
//!   committee's declared date.
//! - The root is absolute, so stored paths never depend on the working directory.
//! - Existing files are never overwritten.
//! - Partially written files are left in place on error.

use super::deletion_queue::DeletionHandle;
use super::{StoreError, StoreResult};
use crate::model::validation::normalize_committee_no;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%I-%M-%S-%p";
const ATTACHMENT_EXTENSION: &str = "pdf";

/// Upload-root bound attachment file store.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    deletions: DeletionHandle,
}

impl AttachmentStore {
    /// Binds a store to `upload_root`, anchoring a relative root at the
    /// current working directory.
    ///
    /// # Errors
    /// - `Io` when the working directory cannot be read.
    pub fn new(upload_root: impl Into<PathBuf>, deletions: DeletionHandle) -> StoreResult<Self> {
        let upload_root = upload_root.into();
        let root = if upload_root.is_absolute() {
            upload_root
        } else {
            std::env::current_dir()
                .map_err(|err| StoreError::io(&upload_root, err))?
                .join(&upload_root)
        };
        Ok(Self { root, deletions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn deletions(&self) -> &DeletionHandle {
        &self.deletions
    }

    /// Writes `source` as the attachment `sequence_index` (0-based) of a
    /// committee, timestamped with the local wall clock.
    pub fn save(
        &self,
        source: &mut dyn Read,
        committee_no: &str,
        declared_date: NaiveDate,
        sequence_index: u32,
    ) -> StoreResult<PathBuf> {
        self.save_at(
            source,
            committee_no,
            declared_date,
            sequence_index,
            Local::now().naive_local(),
        )
    }

    /// [`AttachmentStore::save`] with an explicit clock reading.
    pub fn save_at(
        &self,
        source: &mut dyn Read,
        committee_no: &str,
        declared_date: NaiveDate,
        sequence_index: u32,
        now: NaiveDateTime,
    ) -> StoreResult<PathBuf> {
        let started_at = Instant::now();
        let path = attachment_path(&self.root, committee_no, declared_date, sequence_index, now)?;

        match write_new_file(&path, source) {
            Ok(bytes) => {
                info!(
                    "event=attachment_save module=storage status=ok path={} bytes={bytes} duration_ms={}",
                    path.display(),
                    started_at.elapsed().as_millis()
                );
                Ok(path)
            }
            Err(err) => {
                error!(
                    "event=attachment_save module=storage status=error path={} duration_ms={} error_code={} error={err}",
                    path.display(),
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Queues `path` for removal after `delay`.
    ///
    /// Paths outside the upload root are logged and ignored. Returns whether
    /// the removal was queued.
    pub fn schedule_delete(&self, path: &Path, delay: Duration) -> bool {
        if !self.contains(path) {
            warn!(
                "event=attachment_delete_scheduled module=storage status=error path={} error_code=outside_root",
                path.display()
            );
            return false;
        }
        self.deletions.schedule(path.to_path_buf(), delay)
    }

    /// Removes `path` immediately.
    ///
    /// # Errors
    /// - `OutsideRoot` when `path` is not strictly inside the upload root.
    /// - `Io` for any removal failure, including a missing file.
    pub fn remove_now(&self, path: &Path) -> StoreResult<()> {
        if !self.contains(path) {
            return Err(StoreError::OutsideRoot(path.to_path_buf()));
        }
        fs::remove_file(path).map_err(|err| StoreError::io(path, err))?;
        info!(
            "event=attachment_remove module=storage status=ok path={}",
            path.display()
        );
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        is_within_root(&self.root, path)
    }
}

/// Computes the stored location of an attachment without touching the disk.
pub fn attachment_path(
    root: &Path,
    committee_no: &str,
    declared_date: NaiveDate,
    sequence_index: u32,
    now: NaiveDateTime,
) -> StoreResult<PathBuf> {
    let committee_no = normalize_committee_no(committee_no)
        .map_err(|_| StoreError::InvalidName(committee_no.to_string()))?;
    let file_name = format!(
        "{committee_no}.{}.{}-{}.{ATTACHMENT_EXTENSION}",
        declared_date.year(),
        u64::from(sequence_index) + 1,
        now.format(TIMESTAMP_FORMAT)
    );
    Ok(root.join(now.year().to_string()).join(file_name))
}

/// Returns whether `path` resolves strictly inside `root`.
///
/// Both sides are canonicalized. Missing trailing components are resolved
/// through their nearest existing ancestor. The root itself is not inside the
/// root.
pub fn is_within_root(root: &Path, path: &Path) -> bool {
    let Ok(root) = root.canonicalize() else {
        return false;
    };
    let Some(resolved) = resolve_path(path) else {
        return false;
    };
    resolved != root && resolved.starts_with(&root)
}

fn resolve_path(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut missing_tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            resolved.extend(missing_tail.iter().rev());
            return Some(resolved);
        }
        // `file_name` is `None` for `..` segments, which are never resolved lexically.
        missing_tail.push(existing.file_name()?.to_os_string());
        existing = match existing.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
    }
}

fn write_new_file(path: &Path, source: &mut dyn Read) -> StoreResult<u64> {
    let partition = path
        .parent()
        .ok_or_else(|| StoreError::InvalidName(path.display().to_string()))?;
    fs::create_dir_all(partition).map_err(|err| StoreError::io(partition, err))?;

    if path.exists() {
        return Err(StoreError::AlreadyExists(path.to_path_buf()));
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_path_buf()),
            _ => StoreError::io(path, err),
        })?;

    let bytes = io::copy(source, &mut file).map_err(|err| StoreError::io(path, err))?;
    file.flush().map_err(|err| StoreError::io(path, err))?;
    file.sync_all().map_err(|err| StoreError::io(path, err))?;
    Ok(bytes)
}
