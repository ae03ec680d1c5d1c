//! Domain model for committees, their members and their PDF attachments.
//!
//! # Responsibility
//! - Define the records the repositories persist and the services return.
//! - Own boundary parsing and field validation shared by every write path.
//!
//! # Invariants
//! - A committee is identified by its numeric `id`; `committee_no` alone is
//!   not unique.
//! - Membership rows are never edited in place, only replaced.
//! - Attachment rows are append-only.

pub mod attachment;
pub mod committee;
pub mod employee;
pub mod patch;
pub mod validation;

pub use attachment::{Attachment, AttachmentId, NewAttachment};
pub use committee::{Committee, CommitteeId, CommitteePatch, NewCommittee};
pub use employee::{Employee, EmployeeId, Gender, Membership};
pub use patch::FieldPatch;
pub use validation::{parse_date, parse_employee_ids, ValidationError};
