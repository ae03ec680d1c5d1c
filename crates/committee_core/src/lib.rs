//! Core domain logic for committee records, memberships and PDF attachments.
//! This crate is the single source of truth for aggregate consistency rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use self::config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::{
    parse_date, parse_employee_ids, Attachment, AttachmentId, Committee, CommitteeId,
    CommitteePatch, Employee, EmployeeId, FieldPatch, Gender, Membership, NewCommittee,
    ValidationError,
};
pub use repo::{RepoError, RepoResult, SyncOutcome};
pub use service::{
    AggregateReader, CommitteeCoordinator, CommitteeFilter, CommitteeListQuery, CommitteeView,
    CoreError, CoreResult, DeletionReport, PagedResult, SortField, SortOrder,
};
pub use storage::{
    sweep_orphans, AttachmentStore, DeletionConfig, DeletionQueue, StoreError, SweepMode,
    SweepReport,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
