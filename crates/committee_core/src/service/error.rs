//! Service-level error taxonomy shared by reads and writes.

use crate::model::ValidationError;
use crate::repo::RepoError;
use crate::storage::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug)]
pub enum CoreError {
    /// Malformed or missing input; nothing was mutated.
    Validation(ValidationError),
    CommitteeNotFound(i64),
    AttachmentNotFound(i64),
    EmployeeNotFound(i64),
    /// Membership referenced unknown employees; the transaction was rolled back.
    InvalidReference { missing_employee_ids: Vec<i64> },
    /// Generated attachment path already exists.
    Conflict(PathBuf),
    DuplicateCommittee { committee_no: String, year: i32 },
    Storage(StoreError),
    Repo(RepoError),
}

impl CoreError {
    /// Whether the caller can fix the request (4xx) as opposed to a server fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Repo(_))
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::CommitteeNotFound(_) => "committee_not_found",
            Self::AttachmentNotFound(_) => "attachment_not_found",
            Self::EmployeeNotFound(_) => "employee_not_found",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::Conflict(_) => "conflict",
            Self::DuplicateCommittee { .. } => "duplicate_committee",
            Self::Storage(err) => err.code(),
            Self::Repo(_) => "repo",
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CommitteeNotFound(id) => write!(f, "committee not found: {id}"),
            Self::AttachmentNotFound(id) => write!(f, "attachment not found: {id}"),
            Self::EmployeeNotFound(id) => write!(f, "employee not found: {id}"),
            Self::InvalidReference {
                missing_employee_ids,
            } => write!(f, "unknown employee ids: {missing_employee_ids:?}"),
            Self::Conflict(path) => {
                write!(f, "attachment path already exists: {}", path.display())
            }
            Self::DuplicateCommittee { committee_no, year } => write!(
                f,
                "committee `{committee_no}` already exists for year {year}"
            ),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CoreError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::AlreadyExists(path) => Self::Conflict(path),
            StoreError::InvalidName(name) => {
                Self::Validation(ValidationError::InvalidCommitteeNo(name))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::InvalidReference(missing_employee_ids) => Self::InvalidReference {
                missing_employee_ids,
            },
            RepoError::NotFound { entity: "committee", id } => Self::CommitteeNotFound(id),
            RepoError::NotFound { entity: "attachment", id } => Self::AttachmentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
