//! Attachment row persistence.
//!
//! # Invariants
//! - Rows are inserted and deleted, never updated.
//! - Listings are ordered by upload date, then id.

use crate::model::{Attachment, AttachmentId, CommitteeId, NewAttachment};
use crate::repo::committee_repo::{RepoError, RepoResult};
use crate::repo::in_placeholders;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::PathBuf;

const ATTACHMENT_SELECT_SQL: &str = "SELECT
    id,
    committee_id,
    committee_no,
    sequence_count,
    path,
    uploaded_by_user_id,
    uploaded_date
FROM attachments";

pub trait AttachmentRepository {
    fn insert_attachment(&self, attachment: &NewAttachment) -> RepoResult<AttachmentId>;
    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>>;
    fn count_for_committee(&self, committee_id: CommitteeId) -> RepoResult<usize>;
    fn list_for_committee(&self, committee_id: CommitteeId) -> RepoResult<Vec<Attachment>>;
    /// Attachments of several committees in one query.
    fn list_for_committees(&self, committee_ids: &[CommitteeId]) -> RepoResult<Vec<Attachment>>;
    fn list_by_committee_no(&self, committee_no: &str) -> RepoResult<Vec<Attachment>>;
    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<()>;
    fn delete_for_committee(&self, committee_id: CommitteeId) -> RepoResult<usize>;
    fn list_all_paths(&self) -> RepoResult<Vec<PathBuf>>;
}

pub struct SqliteAttachmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttachmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_attachments(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, parse_attachment_row)?;
        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn insert_attachment(&self, attachment: &NewAttachment) -> RepoResult<AttachmentId> {
        let path = path_to_db(&attachment.path)?;
        self.conn.execute(
            "INSERT INTO attachments (
                committee_id,
                committee_no,
                sequence_count,
                path,
                uploaded_by_user_id,
                uploaded_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                attachment.committee_id,
                attachment.committee_no,
                attachment.sequence_count,
                path,
                attachment.uploaded_by_user_id,
                attachment.uploaded_date,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>> {
        let sql = format!("{ATTACHMENT_SELECT_SQL} WHERE id = ?1;");
        let attachment = self
            .conn
            .query_row(&sql, [id], parse_attachment_row)
            .optional()?;
        Ok(attachment)
    }

    fn count_for_committee(&self, committee_id: CommitteeId) -> RepoResult<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE committee_id = ?1;",
            [committee_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn list_for_committee(&self, committee_id: CommitteeId) -> RepoResult<Vec<Attachment>> {
        let sql = format!(
            "{ATTACHMENT_SELECT_SQL} WHERE committee_id = ?1 ORDER BY uploaded_date ASC, id ASC;"
        );
        self.query_attachments(&sql, [committee_id])
    }

    fn list_for_committees(&self, committee_ids: &[CommitteeId]) -> RepoResult<Vec<Attachment>> {
        if committee_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{ATTACHMENT_SELECT_SQL} WHERE committee_id IN ({}) ORDER BY uploaded_date ASC, id ASC;",
            in_placeholders(committee_ids.len())
        );
        self.query_attachments(&sql, params_from_iter(committee_ids.iter()))
    }

    fn list_by_committee_no(&self, committee_no: &str) -> RepoResult<Vec<Attachment>> {
        let sql = format!(
            "{ATTACHMENT_SELECT_SQL} WHERE committee_no = ?1 ORDER BY uploaded_date ASC, id ASC;"
        );
        self.query_attachments(&sql, [committee_no.trim()])
    }

    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM attachments WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("attachment", id));
        }
        Ok(())
    }

    fn delete_for_committee(&self, committee_id: CommitteeId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM attachments WHERE committee_id = ?1;",
            [committee_id],
        )?;
        Ok(changed)
    }

    fn list_all_paths(&self) -> RepoResult<Vec<PathBuf>> {
        let mut stmt = self.conn.prepare("SELECT path FROM attachments ORDER BY id ASC;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            paths.push(PathBuf::from(row?));
        }
        Ok(paths)
    }
}

pub(crate) fn parse_attachment_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        committee_id: row.get(1)?,
        committee_no: row.get(2)?,
        sequence_count: row.get(3)?,
        path: PathBuf::from(row.get::<_, String>(4)?),
        uploaded_by_user_id: row.get(5)?,
        uploaded_date: row.get(6)?,
    })
}

fn path_to_db(path: &std::path::Path) -> RepoResult<&str> {
    path.to_str().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "attachment path is not valid UTF-8: {}",
            path.display()
        ))
    })
}
