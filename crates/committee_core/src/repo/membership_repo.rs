//! Committee membership persistence and full-replace synchronization.
//!
//! # Responsibility
//! - Make the stored member set of a committee equal the caller's set.
//! - Serve member lists and per-committee member counts.
//!
//! # Invariants
//! - Rows are never edited in place; a change is delete + reinsert.
//! - `None` (unspecified) never touches stored rows; `Some(&[])` clears them.
//! - Every inserted row references an existing employee. Unknown ids fail the
//!   whole call before any row is touched.
//! - The repository never commits; callers run `sync` inside their
//!   transaction so a failure rolls back with everything else.

use crate::model::{CommitteeId, Employee, EmployeeId, Membership};
use crate::repo::committee_repo::{RepoError, RepoResult};
use crate::repo::employee_repo::{
    parse_employee_row, EmployeeRepository, SqliteEmployeeRepository,
};
use crate::repo::in_placeholders;
use chrono::{Local, NaiveDateTime};
use log::debug;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap};

/// Result of a membership synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No member set was supplied; carries the untouched count.
    Unchanged(usize),
    /// Stored members were replaced; carries the new count.
    Replaced(usize),
}

impl SyncOutcome {
    pub fn count(self) -> usize {
        match self {
            Self::Unchanged(count) | Self::Replaced(count) => count,
        }
    }
}

/// Repository interface for committee/employee junction rows.
pub trait MembershipRepository {
    fn sync(
        &self,
        committee_id: CommitteeId,
        desired: Option<&[EmployeeId]>,
        actor_user_id: Option<i64>,
    ) -> RepoResult<SyncOutcome>;
    fn member_count(&self, committee_id: CommitteeId) -> RepoResult<usize>;
    /// Members ordered by name, then id.
    fn list_members(&self, committee_id: CommitteeId) -> RepoResult<Vec<Employee>>;
    fn list_memberships(&self, committee_id: CommitteeId) -> RepoResult<Vec<Membership>>;
    /// Member counts for many committees in one query; absent ids have zero.
    fn member_counts(&self, committee_ids: &[CommitteeId])
        -> RepoResult<HashMap<CommitteeId, usize>>;
}

pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn replace(
        &self,
        committee_id: CommitteeId,
        desired: &BTreeSet<EmployeeId>,
        actor_user_id: Option<i64>,
        created_at: NaiveDateTime,
    ) -> RepoResult<usize> {
        self.conn.execute(
            "DELETE FROM committee_employees WHERE committee_id = ?1;",
            [committee_id],
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO committee_employees (
                committee_id,
                employee_id,
                created_at,
                created_by_user_id
            ) VALUES (?1, ?2, ?3, ?4);",
        )?;
        for employee_id in desired {
            stmt.execute(params![committee_id, employee_id, created_at, actor_user_id])?;
        }
        Ok(desired.len())
    }
}

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn sync(
        &self,
        committee_id: CommitteeId,
        desired: Option<&[EmployeeId]>,
        actor_user_id: Option<i64>,
    ) -> RepoResult<SyncOutcome> {
        let Some(desired) = desired else {
            return Ok(SyncOutcome::Unchanged(self.member_count(committee_id)?));
        };

        let desired: BTreeSet<EmployeeId> = desired.iter().copied().collect();
        let missing = SqliteEmployeeRepository::new(self.conn)
            .missing_ids(&desired.iter().copied().collect::<Vec<_>>())?;
        if !missing.is_empty() {
            return Err(RepoError::InvalidReference(missing));
        }

        let count = self.replace(
            committee_id,
            &desired,
            actor_user_id,
            Local::now().naive_local(),
        )?;
        debug!(
            "event=membership_sync module=repo status=ok committee_id={committee_id} members={count}"
        );
        Ok(SyncOutcome::Replaced(count))
    }

    fn member_count(&self, committee_id: CommitteeId) -> RepoResult<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM committee_employees WHERE committee_id = ?1;",
            [committee_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn list_members(&self, committee_id: CommitteeId) -> RepoResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.emp_id, e.name, e.employee_desc, e.gender
             FROM committee_employees ce
             JOIN employees e ON e.emp_id = ce.employee_id
             WHERE ce.committee_id = ?1
             ORDER BY e.name ASC, e.emp_id ASC;",
        )?;
        let rows = stmt.query_map([committee_id], parse_employee_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    fn list_memberships(&self, committee_id: CommitteeId) -> RepoResult<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT committee_id, employee_id, created_at, created_by_user_id
             FROM committee_employees
             WHERE committee_id = ?1
             ORDER BY employee_id ASC;",
        )?;
        let rows = stmt.query_map([committee_id], |row| {
            Ok(Membership {
                committee_id: row.get(0)?,
                employee_id: row.get(1)?,
                created_at: row.get(2)?,
                created_by_user_id: row.get(3)?,
            })
        })?;
        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?);
        }
        Ok(memberships)
    }

    fn member_counts(
        &self,
        committee_ids: &[CommitteeId],
    ) -> RepoResult<HashMap<CommitteeId, usize>> {
        if committee_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT committee_id, COUNT(*)
             FROM committee_employees
             WHERE committee_id IN ({})
             GROUP BY committee_id;",
            in_placeholders(committee_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(committee_ids.iter()), |row| {
            Ok((row.get::<_, CommitteeId>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::with_capacity(committee_ids.len());
        for row in rows {
            let (committee_id, count) = row?;
            counts.insert(committee_id, usize::try_from(count).unwrap_or_default());
        }
        Ok(counts)
    }
}
