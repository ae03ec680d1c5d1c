//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and storage calls into use-case level APIs.
//! - Map persistence and file-system failures onto one caller-facing error.

pub mod aggregate_reader;
pub mod coordinator;
pub mod error;

pub use aggregate_reader::{
    AggregateReader, AttachmentView, CommitteeFilter, CommitteeListQuery, CommitteeSummary,
    CommitteeView, DashboardCounts, PagedResult, ReportRow, SortField, SortOrder,
    UserCommitteeCount,
};
pub use coordinator::{CommitteeCoordinator, DeletionReport, FailedRemoval};
pub use error::{CoreError, CoreResult};
