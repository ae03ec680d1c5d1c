//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define table-oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories borrow a connection (or a transaction deref'd to one) and
//!   never commit on their own.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidReference`)
//!   in addition to DB transport errors.

pub mod attachment_repo;
pub mod committee_repo;
pub mod employee_repo;
pub mod membership_repo;
pub mod user_repo;

pub use attachment_repo::{AttachmentRepository, SqliteAttachmentRepository};
pub use committee_repo::{
    CommitteeRepository, RepoError, RepoResult, SqliteCommitteeRepository, SuggestionField,
};
pub use employee_repo::{EmployeeRepository, SqliteEmployeeRepository};
pub use membership_repo::{MembershipRepository, SqliteMembershipRepository, SyncOutcome};
pub use user_repo::{SqliteUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` list of `count` items.
pub(crate) fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
