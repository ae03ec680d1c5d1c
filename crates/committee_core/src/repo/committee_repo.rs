//! Committee repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `committees` table.
//! - Answer the `(committee_no, year)` uniqueness check.
//!
//! # Invariants
//! - Write paths only accept normalized input (`NewCommittee::normalized`).
//! - Repositories never commit; the caller owns the transaction.

use crate::db::DbError;
use crate::model::{Committee, CommitteeId, NewCommittee, ValidationError};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const COMMITTEE_SELECT_SQL: &str = "SELECT
    id,
    committee_no,
    committee_date,
    title,
    boss_name,
    sex,
    member_count,
    notes,
    submitted_date,
    submitting_user_id
FROM committees";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every committee-domain table.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: i64 },
    InvalidData(String),
    /// Referenced employee ids that do not exist, sorted and deduplicated.
    InvalidReference(Vec<i64>),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::InvalidReference(ids) => write!(f, "unknown employee ids: {ids:?}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) | Self::InvalidReference(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Text column offering distinct-value suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionField {
    Title,
    BossName,
}

impl SuggestionField {
    fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::BossName => "boss_name",
        }
    }
}

/// Repository interface for committee rows.
pub trait CommitteeRepository {
    fn insert_committee(
        &self,
        committee: &NewCommittee,
        submitted_date: NaiveDate,
        submitting_user_id: Option<i64>,
    ) -> RepoResult<CommitteeId>;
    fn get_committee(&self, id: CommitteeId) -> RepoResult<Option<Committee>>;
    fn update_committee(&self, committee: &Committee) -> RepoResult<()>;
    fn delete_committee(&self, id: CommitteeId) -> RepoResult<()>;
    /// Whether another committee already uses `committee_no` in `year`.
    fn number_taken_in_year(
        &self,
        committee_no: &str,
        year: i32,
        exclude_id: Option<CommitteeId>,
    ) -> RepoResult<bool>;
    fn distinct_numbers(&self) -> RepoResult<Vec<String>>;
    fn suggestions(&self, field: SuggestionField, query: &str, limit: u32) -> RepoResult<Vec<String>>;
    fn last_inserted_number(&self) -> RepoResult<Option<String>>;
}

/// SQLite-backed committee repository.
pub struct SqliteCommitteeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommitteeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CommitteeRepository for SqliteCommitteeRepository<'_> {
    fn insert_committee(
        &self,
        committee: &NewCommittee,
        submitted_date: NaiveDate,
        submitting_user_id: Option<i64>,
    ) -> RepoResult<CommitteeId> {
        let committee = committee.normalized()?;
        self.conn.execute(
            "INSERT INTO committees (
                committee_no,
                committee_date,
                title,
                boss_name,
                sex,
                member_count,
                notes,
                submitted_date,
                submitting_user_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                committee.committee_no,
                committee.committee_date,
                committee.title,
                committee.boss_name,
                committee.sex,
                committee.count,
                committee.notes,
                submitted_date,
                submitting_user_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_committee(&self, id: CommitteeId) -> RepoResult<Option<Committee>> {
        let sql = format!("{COMMITTEE_SELECT_SQL} WHERE id = ?1;");
        let committee = self
            .conn
            .query_row(&sql, [id], parse_committee_row)
            .optional()?;
        Ok(committee)
    }

    fn update_committee(&self, committee: &Committee) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE committees
             SET committee_no = ?2,
                 committee_date = ?3,
                 title = ?4,
                 boss_name = ?5,
                 sex = ?6,
                 member_count = ?7,
                 notes = ?8
             WHERE id = ?1;",
            params![
                committee.id,
                committee.committee_no,
                committee.committee_date,
                committee.title,
                committee.boss_name,
                committee.sex,
                committee.count,
                committee.notes,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("committee", committee.id));
        }
        Ok(())
    }

    fn delete_committee(&self, id: CommitteeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM committees WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("committee", id));
        }
        Ok(())
    }

    fn number_taken_in_year(
        &self,
        committee_no: &str,
        year: i32,
        exclude_id: Option<CommitteeId>,
    ) -> RepoResult<bool> {
        let taken = self.conn.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM committees
                WHERE committee_no = ?1
                  AND strftime('%Y', committee_date) = ?2
                  AND (?3 IS NULL OR id <> ?3)
            );",
            params![committee_no.trim(), format!("{year:04}"), exclude_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(taken)
    }

    fn distinct_numbers(&self) -> RepoResult<Vec<String>> {
        collect_strings(
            self.conn,
            "SELECT DISTINCT trim(committee_no) AS value
             FROM committees
             WHERE trim(committee_no) <> ''
             ORDER BY value ASC;",
            params![],
        )
    }

    fn suggestions(&self, field: SuggestionField, query: &str, limit: u32) -> RepoResult<Vec<String>> {
        let column = field.column();
        let sql = format!(
            "SELECT DISTINCT trim({column}) AS value
             FROM committees
             WHERE trim({column}) <> ''
               AND instr(lower({column}), lower(?1)) > 0
             ORDER BY value ASC
             LIMIT ?2;"
        );
        collect_strings(self.conn, &sql, params![query.trim(), i64::from(limit)])
    }

    fn last_inserted_number(&self) -> RepoResult<Option<String>> {
        let number = self
            .conn
            .query_row(
                "SELECT committee_no FROM committees ORDER BY id DESC LIMIT 1;",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(number)
    }
}

pub(crate) fn parse_committee_row(row: &Row<'_>) -> rusqlite::Result<Committee> {
    Ok(Committee {
        id: row.get(0)?,
        committee_no: row.get(1)?,
        committee_date: row.get(2)?,
        title: row.get(3)?,
        boss_name: row.get(4)?,
        sex: row.get(5)?,
        count: row.get(6)?,
        notes: row.get(7)?,
        submitted_date: row.get(8)?,
        submitting_user_id: row.get(9)?,
    })
}

fn collect_strings(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    let mut values = Vec::new();
    for value in rows {
        values.push(value?);
    }
    Ok(values)
}
