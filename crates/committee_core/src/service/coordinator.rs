//! Write-side orchestration of committees, members and attachments.
//!
//! # Responsibility
//! - Run create/update/delete workflows that touch several tables and the
//!   attachment store as one unit.
//!
//! # Invariants
//! - Every database change of a workflow commits in one transaction or not at
//!   all.
//! - The attachment file is written before the commit and outside rollback
//!   scope. A failure after the write leaves an orphaned file, logged as
//!   `event=attachment_orphaned` and collected by the orphan sweep.
//! - Committee deletion never fails on file removal; failures are reported.
//! - Single-attachment deletion removes the row immediately and the file
//!   after `delete_delay`.

use crate::model::{
    AttachmentId, CommitteeId, CommitteePatch, EmployeeId, NewAttachment, NewCommittee,
    ValidationError,
};
use crate::repo::{
    AttachmentRepository, CommitteeRepository, MembershipRepository, SqliteAttachmentRepository,
    SqliteCommitteeRepository, SqliteMembershipRepository,
};
use crate::service::aggregate_reader::{AggregateReader, CommitteeView};
use crate::service::error::{CoreError, CoreResult};
use crate::storage::AttachmentStore;
use chrono::{Datelike, Local, NaiveDate};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// File that could not be removed during a committee cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRemoval {
    pub path: PathBuf,
    pub error_code: &'static str,
    pub message: String,
}

/// Outcome of [`CommitteeCoordinator::delete_committee`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub committee_id: CommitteeId,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<FailedRemoval>,
}

/// Transactional writer for the committee aggregate.
pub struct CommitteeCoordinator<'a> {
    conn: &'a mut Connection,
    store: &'a AttachmentStore,
    delete_delay: Duration,
}

impl<'a> CommitteeCoordinator<'a> {
    pub fn new(conn: &'a mut Connection, store: &'a AttachmentStore, delete_delay: Duration) -> Self {
        Self {
            conn,
            store,
            delete_delay,
        }
    }

    /// Creates a committee with its members and first attachment.
    ///
    /// An empty `employee_ids` creates a committee with no members.
    ///
    /// # Errors
    /// - `Validation` for blank or malformed fields.
    /// - `DuplicateCommittee` when the number is taken in the same year.
    /// - `InvalidReference` for unknown employee ids.
    /// - `Conflict` / `Storage` when the attachment cannot be written.
    pub fn create(
        &mut self,
        committee: NewCommittee,
        employee_ids: &[EmployeeId],
        actor_user_id: i64,
        source: &mut dyn Read,
    ) -> CoreResult<CommitteeId> {
        let started_at = Instant::now();
        info!("event=committee_create module=service status=start actor={actor_user_id}");
        let result = self.create_in_tx(committee, employee_ids, actor_user_id, source);
        match &result {
            Ok(id) => info!(
                "event=committee_create module=service status=ok committee_id={id} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("committee_create", started_at, err),
        }
        result
    }

    /// Applies a partial update, optional membership replacement and optional
    /// additional attachment, returning the committed view.
    ///
    /// `employee_ids = None` leaves membership untouched; `Some(&[])` clears it.
    pub fn update(
        &mut self,
        id: CommitteeId,
        patch: CommitteePatch,
        employee_ids: Option<&[EmployeeId]>,
        upload: Option<&mut dyn Read>,
        actor_user_id: i64,
    ) -> CoreResult<CommitteeView> {
        let started_at = Instant::now();
        info!("event=committee_update module=service status=start committee_id={id}");
        let result = self
            .update_in_tx(id, patch, employee_ids, upload, actor_user_id)
            .and_then(|()| AggregateReader::new(&*self.conn).get_by_id(id));
        match &result {
            Ok(view) => info!(
                "event=committee_update module=service status=ok committee_id={id} members={} attachments={} duration_ms={}",
                view.employee_count,
                view.attachment_count,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("committee_update", started_at, err),
        }
        result
    }

    /// Deletes a committee, its members, its attachment rows and files.
    ///
    /// Files are removed immediately; a removal failure is recorded in the
    /// report and does not stop the database deletion.
    pub fn delete_committee(&mut self, id: CommitteeId) -> CoreResult<DeletionReport> {
        let started_at = Instant::now();
        let result = self.delete_committee_in_tx(id);
        match &result {
            Ok(report) => info!(
                "event=committee_delete module=service status=ok committee_id={id} removed={} failed={} duration_ms={}",
                report.removed.len(),
                report.failed.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("committee_delete", started_at, err),
        }
        result
    }

    /// Deletes one attachment row now and its file after the configured delay.
    pub fn delete_attachment(&mut self, attachment_id: AttachmentId) -> CoreResult<()> {
        let started_at = Instant::now();
        let result = self.delete_attachment_in_tx(attachment_id);
        match &result {
            Ok(path) => {
                self.store.schedule_delete(path, self.delete_delay);
                info!(
                    "event=attachment_delete_row module=service status=ok attachment_id={attachment_id} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => log_failure("attachment_delete_row", started_at, err),
        }
        result.map(|_| ())
    }

    fn create_in_tx(
        &mut self,
        committee: NewCommittee,
        employee_ids: &[EmployeeId],
        actor_user_id: i64,
        source: &mut dyn Read,
    ) -> CoreResult<CommitteeId> {
        let committee = committee.normalized()?;
        let today = Local::now().date_naive();
        let tx = self.conn.transaction()?;

        let committees = SqliteCommitteeRepository::new(&tx);
        let year = committee.committee_date.year();
        if committees.number_taken_in_year(&committee.committee_no, year, None)? {
            return Err(CoreError::DuplicateCommittee {
                committee_no: committee.committee_no,
                year,
            });
        }
        let id = committees.insert_committee(&committee, today, Some(actor_user_id))?;
        SqliteMembershipRepository::new(&tx).sync(id, Some(employee_ids), Some(actor_user_id))?;

        let upload = Upload {
            committee_id: id,
            committee_no: &committee.committee_no,
            declared_date: committee.committee_date,
            actor_user_id,
            today,
        };
        let written = attach_file(&tx, self.store, &upload, source)?;
        commit_after_write(tx, &written)?;
        Ok(id)
    }

    fn update_in_tx(
        &mut self,
        id: CommitteeId,
        patch: CommitteePatch,
        employee_ids: Option<&[EmployeeId]>,
        upload: Option<&mut dyn Read>,
        actor_user_id: i64,
    ) -> CoreResult<()> {
        if patch.is_empty() && employee_ids.is_none() && upload.is_none() {
            return Err(CoreError::Validation(ValidationError::EmptyUpdate));
        }

        let tx = self.conn.transaction()?;
        let committees = SqliteCommitteeRepository::new(&tx);
        let mut committee = committees
            .get_committee(id)?
            .ok_or(CoreError::CommitteeNotFound(id))?;

        let changed = patch.apply_to(&mut committee)?;
        let renumbered = changed
            .iter()
            .any(|field| matches!(*field, "committee_no" | "committee_date"));
        let year = committee.year();
        if renumbered && committees.number_taken_in_year(&committee.committee_no, year, Some(id))? {
            return Err(CoreError::DuplicateCommittee {
                committee_no: committee.committee_no,
                year,
            });
        }
        if !changed.is_empty() {
            committees.update_committee(&committee)?;
        }

        SqliteMembershipRepository::new(&tx).sync(id, employee_ids, Some(actor_user_id))?;

        let Some(source) = upload else {
            tx.commit()?;
            return Ok(());
        };
        let upload = Upload {
            committee_id: id,
            committee_no: &committee.committee_no,
            declared_date: committee.committee_date,
            actor_user_id,
            today: Local::now().date_naive(),
        };
        let written = attach_file(&tx, self.store, &upload, source)?;
        commit_after_write(tx, &written)
    }

    fn delete_committee_in_tx(&mut self, id: CommitteeId) -> CoreResult<DeletionReport> {
        let tx = self.conn.transaction()?;
        let committees = SqliteCommitteeRepository::new(&tx);
        if committees.get_committee(id)?.is_none() {
            return Err(CoreError::CommitteeNotFound(id));
        }

        let attachments = SqliteAttachmentRepository::new(&tx);
        let mut report = DeletionReport {
            committee_id: id,
            ..DeletionReport::default()
        };
        for attachment in attachments.list_for_committee(id)? {
            match self.store.remove_now(&attachment.path) {
                Ok(()) => report.removed.push(attachment.path),
                Err(err) => {
                    warn!(
                        "event=attachment_remove module=service status=error committee_id={id} path={} error_code={} error={err}",
                        attachment.path.display(),
                        err.code()
                    );
                    report.failed.push(FailedRemoval {
                        path: attachment.path,
                        error_code: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        attachments.delete_for_committee(id)?;
        SqliteMembershipRepository::new(&tx).sync(id, Some(&[][..]), None)?;
        committees.delete_committee(id)?;
        tx.commit()?;
        Ok(report)
    }

    fn delete_attachment_in_tx(&mut self, attachment_id: AttachmentId) -> CoreResult<PathBuf> {
        let tx = self.conn.transaction()?;
        let attachments = SqliteAttachmentRepository::new(&tx);
        let attachment = attachments
            .get_attachment(attachment_id)?
            .ok_or(CoreError::AttachmentNotFound(attachment_id))?;
        if !self.store.contains(&attachment.path) {
            return Err(CoreError::Validation(ValidationError::Invalid(format!(
                "attachment {attachment_id} is stored outside the upload root"
            ))));
        }
        attachments.delete_attachment(attachment_id)?;
        tx.commit()?;
        Ok(attachment.path)
    }
}

struct Upload<'a> {
    committee_id: CommitteeId,
    committee_no: &'a str,
    declared_date: NaiveDate,
    actor_user_id: i64,
    today: NaiveDate,
}

/// Saves the next attachment of a committee and inserts its row.
fn attach_file(
    tx: &Transaction<'_>,
    store: &AttachmentStore,
    upload: &Upload<'_>,
    source: &mut dyn Read,
) -> CoreResult<PathBuf> {
    let attachments = SqliteAttachmentRepository::new(tx);
    let existing = attachments.count_for_committee(upload.committee_id)?;
    let sequence_index = u32::try_from(existing).map_err(|_| ValidationError::OutOfRange {
        field: "sequence_count",
        value: i64::try_from(existing).unwrap_or(i64::MAX),
    })?;

    let path = store.save(source, upload.committee_no, upload.declared_date, sequence_index)?;
    let row = NewAttachment {
        committee_id: upload.committee_id,
        committee_no: upload.committee_no.to_string(),
        sequence_count: i64::from(sequence_index) + 1,
        path: path.clone(),
        uploaded_by_user_id: Some(upload.actor_user_id),
        uploaded_date: upload.today,
    };
    if let Err(err) = attachments.insert_attachment(&row) {
        log_orphan(&path);
        return Err(err.into());
    }
    Ok(path)
}

fn commit_after_write(tx: Transaction<'_>, written: &Path) -> CoreResult<()> {
    tx.commit().map_err(|err| {
        log_orphan(written);
        CoreError::from(err)
    })
}

fn log_orphan(path: &Path) {
    warn!(
        "event=attachment_orphaned module=service status=error path={}",
        path.display()
    );
}

fn log_failure(event: &str, started_at: Instant, err: &CoreError) {
    let duration_ms = started_at.elapsed().as_millis();
    if err.is_client_error() {
        warn!(
            "event={event} module=service status=rejected duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        );
    } else {
        error!(
            "event={event} module=service status=error duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        );
    }
}
