//! Employee lookups used by membership validation and read views.

use crate::model::{Employee, EmployeeId, Gender, ValidationError};
use crate::model::validation::require_text;
use crate::repo::committee_repo::{RepoError, RepoResult};
use crate::repo::in_placeholders;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const EMPLOYEE_SELECT_SQL: &str =
    "SELECT emp_id, name, employee_desc, gender FROM employees";

/// Repository interface for employee rows.
pub trait EmployeeRepository {
    fn insert_employee(
        &self,
        name: &str,
        employee_desc: Option<i64>,
        gender: Gender,
    ) -> RepoResult<EmployeeId>;
    fn get_employee(&self, emp_id: EmployeeId) -> RepoResult<Option<Employee>>;
    /// Returns the ids from `ids` with no employee row, sorted and deduplicated.
    fn missing_ids(&self, ids: &[EmployeeId]) -> RepoResult<Vec<EmployeeId>>;
}

pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn insert_employee(
        &self,
        name: &str,
        employee_desc: Option<i64>,
        gender: Gender,
    ) -> RepoResult<EmployeeId> {
        let name = require_text("name", name)?;
        if let Some(value) = employee_desc.filter(|value| *value < 0) {
            return Err(RepoError::Validation(ValidationError::OutOfRange {
                field: "employee_desc",
                value,
            }));
        }
        self.conn.execute(
            "INSERT INTO employees (name, employee_desc, gender) VALUES (?1, ?2, ?3);",
            params![name, employee_desc, gender.to_db()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_employee(&self, emp_id: EmployeeId) -> RepoResult<Option<Employee>> {
        let sql = format!("{EMPLOYEE_SELECT_SQL} WHERE emp_id = ?1;");
        let employee = self
            .conn
            .query_row(&sql, [emp_id], parse_employee_row)
            .optional()?;
        Ok(employee)
    }

    fn missing_ids(&self, ids: &[EmployeeId]) -> RepoResult<Vec<EmployeeId>> {
        let wanted: BTreeSet<EmployeeId> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT emp_id FROM employees WHERE emp_id IN ({});",
            in_placeholders(wanted.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(wanted.iter()), |row| {
            row.get::<_, EmployeeId>(0)
        })?;
        let mut found = BTreeSet::new();
        for row in rows {
            found.insert(row?);
        }
        Ok(wanted.difference(&found).copied().collect())
    }
}

pub(crate) fn parse_employee_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        emp_id: row.get(0)?,
        name: row.get(1)?,
        employee_desc: row.get(2)?,
        gender: Gender::from_db(row.get(3)?),
    })
}
