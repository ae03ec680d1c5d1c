//! Read-side composite views over committees, members and attachments.
//!
//! # Responsibility
//! - Build the single-committee view and paginated committee listings.
//! - Serve the lookup/suggestion/report reads used by the UI.
//!
//! # Invariants
//! - Listings are one row per committee `id`; count and page use the same
//!   filtered set, so the sum of page sizes equals `total`.
//! - Ordering is always tie-broken on `id`, making pagination a total order.
//! - Children of a page are fetched with a bounded number of `IN (...)`
//!   queries, never one query per row.

use crate::model::validation::normalize_committee_no;
use crate::model::{
    Attachment, AttachmentId, Committee, CommitteeId, Employee, EmployeeId, ValidationError,
};
use crate::repo::attachment_repo::parse_attachment_row;
use crate::repo::committee_repo::parse_committee_row;
use crate::repo::{
    AttachmentRepository, CommitteeRepository, EmployeeRepository, MembershipRepository,
    SqliteAttachmentRepository, SqliteCommitteeRepository, SqliteEmployeeRepository,
    SqliteMembershipRepository, SqliteUserRepository, SuggestionField, UserRepository,
};
use crate::repo::in_placeholders;
use crate::service::error::{CoreError, CoreResult};
use crate::storage::is_within_root;
use chrono::{Datelike, NaiveDate};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SUGGESTION_LIMIT: u32 = 5;
pub const MAX_SUGGESTION_LIMIT: u32 = 20;

/// Attachment with its uploader's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub uploaded_by: Option<String>,
}

/// Full view of one committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitteeView {
    #[serde(flatten)]
    pub committee: Committee,
    pub submitted_by: Option<String>,
    /// Ordered by upload date, then id.
    pub attachments: Vec<AttachmentView>,
    /// Ordered by name, then id.
    pub employees: Vec<Employee>,
    pub attachment_count: usize,
    pub employee_count: usize,
}

/// One row of a committee listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitteeSummary {
    /// 1-based position across the whole result set.
    pub serial_no: u64,
    #[serde(flatten)]
    pub committee: Committee,
    pub submitted_by: Option<String>,
    pub attachments: Vec<AttachmentView>,
    pub employee_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Listing filters. Blank text filters are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitteeFilter {
    /// Exact match after trimming.
    pub committee_no: Option<String>,
    /// Case-insensitive substring.
    pub title: Option<String>,
    /// Case-insensitive substring.
    pub boss_name: Option<String>,
    /// Inclusive lower bound on `committee_date`.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `committee_date`.
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    CommitteeNo,
    CommitteeDate,
    Title,
    BossName,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "c.id",
            Self::CommitteeNo => "c.committee_no",
            Self::CommitteeDate => "c.committee_date",
            Self::Title => "c.title",
            Self::BossName => "c.boss_name",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeListQuery {
    pub filter: CommitteeFilter,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl Default for CommitteeListQuery {
    fn default() -> Self {
        Self {
            filter: CommitteeFilter::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl CommitteeListQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.page == 0 {
            return Err(ValidationError::OutOfRange {
                field: "page",
                value: i64::from(self.page),
            });
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "page_size",
                value: i64::from(self.page_size),
            });
        }
        check_date_range(self.filter.date_from, self.filter.date_to)
    }

    fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// Committee with submitting username, as listed in date-range reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub committee: Committee,
    pub submitted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCommitteeCount {
    pub username: String,
    pub committees: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub total_committees: u64,
    pub total_users: u64,
    /// Users with at least one committee, most active first.
    pub per_user: Vec<UserCommitteeCount>,
}

/// Read-only view builder over a migrated connection.
pub struct AggregateReader<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AggregateReader<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads one committee with its attachments, members and submitter.
    pub fn get_by_id(&self, id: CommitteeId) -> CoreResult<CommitteeView> {
        let committee = self.require_committee(id)?;
        let attachments = self.attachment_views(&[id])?;
        let employees = SqliteMembershipRepository::new(self.conn).list_members(id)?;
        let submitted_by = match committee.submitting_user_id {
            Some(user_id) => SqliteUserRepository::new(self.conn).username(user_id)?,
            None => None,
        };

        Ok(CommitteeView {
            attachment_count: attachments.len(),
            employee_count: employees.len(),
            committee,
            submitted_by,
            attachments,
            employees,
        })
    }

    /// Returns one page of committees matching `query.filter`.
    pub fn list_page(&self, query: &CommitteeListQuery) -> CoreResult<PagedResult<CommitteeSummary>> {
        let started_at = Instant::now();
        query.validate()?;
        let (where_sql, mut params) = filter_clause(&query.filter)?;

        let count_sql = format!("SELECT COUNT(*) FROM committees c{where_sql};");
        let total = self
            .conn
            .query_row(&count_sql, params_from_iter(params.iter()), |row| {
                row.get::<_, i64>(0)
            })?;
        let total = u64::try_from(total).unwrap_or_default();

        let order = query.sort_order.keyword();
        let page_sql = format!(
            "SELECT
                c.id, c.committee_no, c.committee_date, c.title, c.boss_name,
                c.sex, c.member_count, c.notes, c.submitted_date, c.submitting_user_id,
                u.username
             FROM committees c
             LEFT JOIN users u ON u.id = c.submitting_user_id{where_sql}
             ORDER BY {column} {order}, c.id {order}
             LIMIT ? OFFSET ?;",
            column = query.sort_field.column()
        );
        let offset = query.offset();
        params.push(Value::Integer(i64::from(query.page_size)));
        params.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&page_sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((parse_committee_row(row)?, row.get::<_, Option<String>>(10)?))
        })?;
        let mut parents = Vec::new();
        for row in rows {
            parents.push(row?);
        }

        let ids: Vec<CommitteeId> = parents.iter().map(|(committee, _)| committee.id).collect();
        let mut attachments = group_by_committee(self.attachment_views(&ids)?);
        let counts = SqliteMembershipRepository::new(self.conn).member_counts(&ids)?;

        let items = parents
            .into_iter()
            .zip(offset + 1..)
            .map(|((committee, submitted_by), serial_no)| CommitteeSummary {
                serial_no,
                attachments: attachments.remove(&committee.id).unwrap_or_default(),
                employee_count: counts.get(&committee.id).copied().unwrap_or(0),
                committee,
                submitted_by,
            })
            .collect();

        let total_pages = total.div_ceil(u64::from(query.page_size));
        debug!(
            "event=committee_list module=service status=ok page={} page_size={} total={total} duration_ms={}",
            query.page,
            query.page_size,
            started_at.elapsed().as_millis()
        );
        Ok(PagedResult {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
            total_pages,
            has_next: u64::from(query.page) < total_pages,
            has_previous: query.page > 1,
        })
    }

    /// Members of a committee ordered by name.
    pub fn committee_employees(&self, id: CommitteeId) -> CoreResult<Vec<Employee>> {
        self.require_committee(id)?;
        Ok(SqliteMembershipRepository::new(self.conn).list_members(id)?)
    }

    pub fn employee(&self, emp_id: EmployeeId) -> CoreResult<Employee> {
        SqliteEmployeeRepository::new(self.conn)
            .get_employee(emp_id)?
            .ok_or(CoreError::EmployeeNotFound(emp_id))
    }

    /// Every attachment filed under `committee_no`, across years.
    pub fn attachments_by_committee_no(&self, committee_no: &str) -> CoreResult<Vec<Attachment>> {
        let committee_no = normalize_committee_no(committee_no)?;
        Ok(SqliteAttachmentRepository::new(self.conn).list_by_committee_no(&committee_no)?)
    }

    /// Resolves the file to serve for an attachment.
    ///
    /// # Errors
    /// - `AttachmentNotFound` when the row is absent or its file is missing.
    /// - `Validation` when the stored path is outside `upload_root`.
    pub fn attachment_file(&self, id: AttachmentId, upload_root: &Path) -> CoreResult<PathBuf> {
        let attachment = SqliteAttachmentRepository::new(self.conn)
            .get_attachment(id)?
            .ok_or(CoreError::AttachmentNotFound(id))?;
        if !attachment.path.exists() {
            return Err(CoreError::AttachmentNotFound(id));
        }
        if !is_within_root(upload_root, &attachment.path) {
            return Err(CoreError::Validation(ValidationError::Invalid(format!(
                "attachment {id} is stored outside the upload root"
            ))));
        }
        Ok(attachment.path)
    }

    /// Whether `committee_no` is already used in the year of `date`.
    pub fn committee_no_exists(&self, committee_no: &str, date: NaiveDate) -> CoreResult<bool> {
        let committee_no = normalize_committee_no(committee_no)?;
        Ok(SqliteCommitteeRepository::new(self.conn).number_taken_in_year(
            &committee_no,
            date.year(),
            None,
        )?)
    }

    pub fn distinct_committee_numbers(&self) -> CoreResult<Vec<String>> {
        Ok(SqliteCommitteeRepository::new(self.conn).distinct_numbers()?)
    }

    pub fn title_suggestions(&self, query: &str, limit: u32) -> CoreResult<Vec<String>> {
        self.suggestions(SuggestionField::Title, query, limit)
    }

    pub fn boss_name_suggestions(&self, query: &str, limit: u32) -> CoreResult<Vec<String>> {
        self.suggestions(SuggestionField::BossName, query, limit)
    }

    /// Committees dated within `[from, to]`, oldest first.
    pub fn report_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<ReportRow>> {
        check_date_range(Some(from), Some(to))?;
        let mut stmt = self.conn.prepare(
            "SELECT
                c.id, c.committee_no, c.committee_date, c.title, c.boss_name,
                c.sex, c.member_count, c.notes, c.submitted_date, c.submitting_user_id,
                u.username
             FROM committees c
             LEFT JOIN users u ON u.id = c.submitting_user_id
             WHERE c.committee_date BETWEEN ?1 AND ?2
             ORDER BY c.committee_date ASC, c.id ASC;",
        )?;
        let rows = stmt.query_map(rusqlite::params![from, to], |row| {
            Ok(ReportRow {
                committee: parse_committee_row(row)?,
                submitted_by: row.get(10)?,
            })
        })?;
        let mut report = Vec::new();
        for row in rows {
            report.push(row?);
        }
        Ok(report)
    }

    /// Number of the most recently created committee.
    pub fn last_committee_no(&self) -> CoreResult<Option<String>> {
        Ok(SqliteCommitteeRepository::new(self.conn).last_inserted_number()?)
    }

    pub fn dashboard_counts(&self) -> CoreResult<DashboardCounts> {
        let total_committees = self
            .conn
            .query_row("SELECT COUNT(*) FROM committees;", [], |row| row.get::<_, i64>(0))?;
        let total_users = SqliteUserRepository::new(self.conn).count_users()?;

        let mut stmt = self.conn.prepare(
            "SELECT u.username, COUNT(c.id) AS committees
             FROM users u
             JOIN committees c ON c.submitting_user_id = u.id
             GROUP BY u.id, u.username
             ORDER BY committees DESC, u.username ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserCommitteeCount {
                username: row.get(0)?,
                committees: u64::try_from(row.get::<_, i64>(1)?).unwrap_or_default(),
            })
        })?;
        let mut per_user = Vec::new();
        for row in rows {
            per_user.push(row?);
        }

        Ok(DashboardCounts {
            total_committees: u64::try_from(total_committees).unwrap_or_default(),
            total_users,
            per_user,
        })
    }

    fn suggestions(&self, field: SuggestionField, query: &str, limit: u32) -> CoreResult<Vec<String>> {
        let limit = limit.clamp(1, MAX_SUGGESTION_LIMIT);
        Ok(SqliteCommitteeRepository::new(self.conn).suggestions(field, query, limit)?)
    }

    fn require_committee(&self, id: CommitteeId) -> CoreResult<Committee> {
        SqliteCommitteeRepository::new(self.conn)
            .get_committee(id)?
            .ok_or(CoreError::CommitteeNotFound(id))
    }

    /// Attachments of `ids` with uploader names, in one query.
    fn attachment_views(&self, ids: &[CommitteeId]) -> CoreResult<Vec<AttachmentView>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT
                a.id, a.committee_id, a.committee_no, a.sequence_count, a.path,
                a.uploaded_by_user_id, a.uploaded_date, u.username
             FROM attachments a
             LEFT JOIN users u ON u.id = a.uploaded_by_user_id
             WHERE a.committee_id IN ({})
             ORDER BY a.uploaded_date ASC, a.id ASC;",
            in_placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok(AttachmentView {
                attachment: parse_attachment_row(row)?,
                uploaded_by: row.get(7)?,
            })
        })?;
        let mut views = Vec::new();
        for row in rows {
            views.push(row?);
        }
        Ok(views)
    }
}

fn group_by_committee(views: Vec<AttachmentView>) -> HashMap<CommitteeId, Vec<AttachmentView>> {
    let mut grouped: HashMap<CommitteeId, Vec<AttachmentView>> = HashMap::new();
    for view in views {
        grouped
            .entry(view.attachment.committee_id)
            .or_default()
            .push(view);
    }
    grouped
}

fn filter_clause(filter: &CommitteeFilter) -> Result<(String, Vec<Value>), ValidationError> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(committee_no) = non_blank(filter.committee_no.as_deref()) {
        clauses.push("c.committee_no = ?");
        params.push(Value::Text(committee_no.to_string()));
    }
    if let Some(title) = non_blank(filter.title.as_deref()) {
        clauses.push("instr(lower(c.title), lower(?)) > 0");
        params.push(Value::Text(title.to_string()));
    }
    if let Some(boss_name) = non_blank(filter.boss_name.as_deref()) {
        clauses.push("instr(lower(c.boss_name), lower(?)) > 0");
        params.push(Value::Text(boss_name.to_string()));
    }
    check_date_range(filter.date_from, filter.date_to)?;
    if let Some(from) = filter.date_from {
        clauses.push("c.committee_date >= ?");
        params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.date_to {
        clauses.push("c.committee_date <= ?");
        params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
    }

    if clauses.is_empty() {
        return Ok((String::new(), params));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), params))
}

fn check_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), ValidationError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(ValidationError::InvalidDateRange { from, to }),
        _ => Ok(()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
