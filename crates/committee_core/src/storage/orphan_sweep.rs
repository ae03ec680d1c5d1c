//! Reconciliation between the upload tree and stored attachment rows.
//!
//! # Responsibility
//! - Find PDFs under `{root}/{year}/` that no attachment row references.
//! - Remove them once they are older than a grace period.
//! - Report rows whose file is gone without mutating them.
//!
//! # Invariants
//! - Only regular `.pdf` files one partition level below the root are
//!   candidates.
//! - Files younger than the grace period are never removed; they may belong to
//!   a transaction that has not committed yet.

use super::attachment_store::is_within_root;
use crate::repo::{AttachmentRepository, RepoError, SqliteAttachmentRepository};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    Apply,
    /// Report what would be removed without removing it.
    DryRun,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    /// Unreferenced files old enough to remove.
    pub orphaned: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub skipped_recent: usize,
    pub failed: Vec<PathBuf>,
    /// Stored paths whose file no longer exists.
    pub dangling_rows: Vec<PathBuf>,
}

/// Sweeps `upload_root` for attachment files without a row.
pub fn sweep_orphans(
    conn: &Connection,
    upload_root: &Path,
    grace: Duration,
    mode: SweepMode,
) -> Result<SweepReport, RepoError> {
    let started_at = Instant::now();
    let stored = SqliteAttachmentRepository::new(conn).list_all_paths()?;
    let known: HashSet<PathBuf> = stored.iter().map(|path| canonical_or_raw(path)).collect();

    let mut report = SweepReport::default();
    for path in &stored {
        if !path.exists() {
            report.dangling_rows.push(path.clone());
        }
    }

    let now = SystemTime::now();
    for candidate in candidate_files(upload_root) {
        report.scanned += 1;
        if known.contains(&canonical_or_raw(&candidate)) {
            continue;
        }
        if !older_than(&candidate, grace, now) {
            report.skipped_recent += 1;
            continue;
        }
        report.orphaned.push(candidate.clone());
        if mode == SweepMode::DryRun {
            continue;
        }
        if !is_within_root(upload_root, &candidate) {
            report.failed.push(candidate);
            continue;
        }
        match fs::remove_file(&candidate) {
            Ok(()) => report.removed.push(candidate),
            Err(err) => {
                warn!(
                    "event=orphan_sweep_remove module=storage status=error path={} error={err}",
                    candidate.display()
                );
                report.failed.push(candidate);
            }
        }
    }

    info!(
        "event=orphan_sweep module=storage status=ok mode={mode:?} scanned={} orphaned={} removed={} skipped_recent={} failed={} dangling_rows={} duration_ms={}",
        report.scanned,
        report.orphaned.len(),
        report.removed.len(),
        report.skipped_recent,
        report.failed.len(),
        report.dangling_rows.len(),
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn candidate_files(upload_root: &Path) -> Vec<PathBuf> {
    let Ok(partitions) = fs::read_dir(upload_root) else {
        warn!(
            "event=orphan_sweep module=storage status=error path={} error_code=unreadable_root",
            upload_root.display()
        );
        return Vec::new();
    };

    let mut files = Vec::new();
    for partition in partitions.flatten() {
        if !partition.file_type().is_ok_and(|kind| kind.is_dir()) {
            continue;
        }
        let Ok(entries) = fs::read_dir(partition.path()) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
            if is_file && path.extension() == Some(OsStr::new("pdf")) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn older_than(path: &Path, grace: Duration, now: SystemTime) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(|modified| now.duration_since(modified).unwrap_or_default())
        .is_some_and(|age| age >= grace)
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
