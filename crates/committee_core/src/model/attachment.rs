//! PDF attachment record.
//!
//! # Invariants
//! - `path` always lies inside the configured upload root.
//! - Rows are never rewritten; a new upload is a new row.

use super::committee::CommitteeId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type AttachmentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub committee_id: CommitteeId,
    /// Copy of the owning committee's number at upload time.
    pub committee_no: String,
    /// 1-based ordinal embedded in the file name.
    pub sequence_count: i64,
    pub path: PathBuf,
    pub uploaded_by_user_id: Option<i64>,
    pub uploaded_date: NaiveDate,
}

/// Attachment row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub committee_id: CommitteeId,
    pub committee_no: String,
    pub sequence_count: i64,
    pub path: PathBuf,
    pub uploaded_by_user_id: Option<i64>,
    pub uploaded_date: NaiveDate,
}
