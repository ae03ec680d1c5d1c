mod common;

use committee_core::model::FieldPatch;
use committee_core::repo::{AttachmentRepository, SqliteAttachmentRepository};
use committee_core::storage::{AttachmentStore, StoreError};
use committee_core::{
    AggregateReader, CommitteeCoordinator, CommitteePatch, CoreError, NewCommittee,
    ValidationError,
};
use common::{date, pdf, seed_employees, seed_user, Fixture};
use std::fs;
use std::io::Read;
use std::time::Duration;

fn c100() -> NewCommittee {
    NewCommittee::new("C-100", date(2024, 3, 1), "Procurement review", "Huda Kareem")
}

#[test]
fn create_then_get_returns_members_by_name_and_one_attachment() {
    let mut fx = Fixture::new();
    let actor = seed_user(&fx.conn, "clerk");
    let ids = seed_employees(&fx.conn, &["Zaid", "Amal", "Mona"]);

    let id = fx
        .coordinator()
        .create(c100(), &ids, actor, &mut pdf("first"))
        .unwrap();

    let view = AggregateReader::new(&fx.conn).get_by_id(id).unwrap();
    let names: Vec<&str> = view.employees.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Amal", "Mona", "Zaid"]);
    assert_eq!(view.employee_count, 3);
    assert_eq!(view.attachment_count, 1);
    assert_eq!(view.submitted_by.as_deref(), Some("clerk"));
    assert_eq!(view.committee.submitting_user_id, Some(actor));

    let attachment = &view.attachments[0];
    assert_eq!(attachment.uploaded_by.as_deref(), Some("clerk"));
    assert_eq!(attachment.attachment.sequence_count, 1);
    let file_name = attachment.attachment.path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("C-100.2024.1-"), "{file_name}");
    assert!(file_name.ends_with(".pdf"));
    assert!(attachment.attachment.path.is_absolute());
    assert!(fx.store.contains(&attachment.attachment.path));
    assert!(fs::read(&attachment.attachment.path).unwrap().starts_with(b"%PDF"));
}

#[test]
fn clearing_members_keeps_attachments() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal", "Basim", "Dana"]);
    let id = fx
        .coordinator()
        .create(c100(), &ids, 1, &mut pdf("first"))
        .unwrap();

    let view = fx
        .coordinator()
        .update(id, CommitteePatch::default(), Some(&[][..]), None, 1)
        .unwrap();

    assert_eq!(view.employee_count, 0);
    assert_eq!(view.attachment_count, 1);
}

#[test]
fn unknown_employee_in_update_leaves_membership_unchanged() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal", "Basim", "Dana"]);
    let id = fx
        .coordinator()
        .create(c100(), &ids, 1, &mut pdf("first"))
        .unwrap();

    let patch = CommitteePatch {
        title: FieldPatch::Set("Renamed".to_string()),
        ..CommitteePatch::default()
    };
    let err = fx
        .coordinator()
        .update(id, patch, Some(&[ids[0], 31337][..]), None, 1)
        .unwrap_err();
    match err {
        CoreError::InvalidReference {
            missing_employee_ids,
        } => assert_eq!(missing_employee_ids, vec![31337]),
        other => panic!("unexpected error: {other}"),
    }

    let view = AggregateReader::new(&fx.conn).get_by_id(id).unwrap();
    assert_eq!(view.employee_count, 3);
    assert_eq!(view.committee.title, "Procurement review");
}

#[test]
fn update_applies_only_present_fields_and_appends_attachment() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal"]);
    let id = fx
        .coordinator()
        .create(c100(), &ids, 1, &mut pdf("first"))
        .unwrap();

    let patch = CommitteePatch {
        notes: FieldPatch::Set("moved to Q2".to_string()),
        count: FieldPatch::Set(4),
        ..CommitteePatch::default()
    };
    let mut second = pdf("second");
    let view = fx
        .coordinator()
        .update(id, patch, None, Some(&mut second as &mut dyn Read), 2)
        .unwrap();

    assert_eq!(view.committee.notes.as_deref(), Some("moved to Q2"));
    assert_eq!(view.committee.count, Some(4));
    assert_eq!(view.committee.title, "Procurement review");
    assert_eq!(view.employee_count, 1);
    assert_eq!(view.attachment_count, 2);

    let sequences: Vec<i64> = view
        .attachments
        .iter()
        .map(|a| a.attachment.sequence_count)
        .collect();
    assert_eq!(sequences, [1, 2]);
    let second_name = view.attachments[1].attachment.path.file_name().unwrap();
    assert!(second_name.to_str().unwrap().starts_with("C-100.2024.2-"));
    assert_eq!(view.attachments[1].attachment.uploaded_by_user_id, Some(2));
}

#[test]
fn update_rejects_empty_request_clears_of_required_fields_and_missing_rows() {
    let mut fx = Fixture::new();
    let id = fx
        .coordinator()
        .create(c100(), &[], 1, &mut pdf("first"))
        .unwrap();

    let err = fx
        .coordinator()
        .update(id, CommitteePatch::default(), None, None, 1)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(ValidationError::EmptyUpdate)));

    let clear_title = CommitteePatch {
        title: FieldPatch::Clear,
        ..CommitteePatch::default()
    };
    let err = fx.coordinator().update(id, clear_title, None, None, 1).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::RequiredField("title"))
    ));

    let rename = CommitteePatch {
        title: FieldPatch::Set("x".to_string()),
        ..CommitteePatch::default()
    };
    let err = fx.coordinator().update(404, rename, None, None, 1).unwrap_err();
    assert!(matches!(err, CoreError::CommitteeNotFound(404)));
}

#[test]
fn committee_number_is_unique_per_year_only() {
    let mut fx = Fixture::new();
    let first = fx
        .coordinator()
        .create(c100(), &[], 1, &mut pdf("a"))
        .unwrap();

    let same_year = NewCommittee::new("C-100", date(2024, 11, 20), "Other", "Other boss");
    let err = fx
        .coordinator()
        .create(same_year, &[], 1, &mut pdf("b"))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::DuplicateCommittee { ref committee_no, year: 2024 } if committee_no == "C-100"
    ));

    let next_year = NewCommittee::new("C-100", date(2025, 1, 5), "Other", "Other boss");
    let second = fx
        .coordinator()
        .create(next_year, &[], 1, &mut pdf("c"))
        .unwrap();

    let back_to_2024 = CommitteePatch {
        committee_date: FieldPatch::Set(date(2024, 6, 1)),
        ..CommitteePatch::default()
    };
    let err = fx
        .coordinator()
        .update(second, back_to_2024, None, None, 1)
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateCommittee { .. }));

    let same_committee_new_day = CommitteePatch {
        committee_date: FieldPatch::Set(date(2024, 6, 1)),
        ..CommitteePatch::default()
    };
    fx.coordinator()
        .update(first, same_committee_new_day, None, None, 1)
        .unwrap();
}

#[test]
fn failed_create_rolls_back_rows_but_leaves_no_committee() {
    let mut fx = Fixture::new();
    let err = fx
        .coordinator()
        .create(c100(), &[5, 6], 1, &mut pdf("a"))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidReference { .. }));
    assert_eq!(committee_count(&fx), 0);
}

/// A store whose upload root is a plain file, so every save fails.
fn blocked_store(fx: &Fixture) -> AttachmentStore {
    let blocked = fx.root.path().join("blocked");
    fs::write(&blocked, b"not a directory").unwrap();
    AttachmentStore::new(blocked, fx.queue.handle()).unwrap()
}

fn committee_count(fx: &Fixture) -> i64 {
    fx.conn
        .query_row("SELECT COUNT(*) FROM committees;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn storage_failure_during_create_rolls_back_everything() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal", "Basim"]);
    let store = blocked_store(&fx);

    let err = CommitteeCoordinator::new(&mut fx.conn, &store, Duration::ZERO)
        .create(c100(), &ids, 1, &mut pdf("a"))
        .unwrap_err();
    assert!(
        matches!(err, CoreError::Storage(StoreError::Io { .. })),
        "unexpected error: {err}"
    );
    assert!(!err.is_client_error());

    assert_eq!(committee_count(&fx), 0);
    let members: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM committee_employees;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(members, 0);
    assert!(SqliteAttachmentRepository::new(&fx.conn)
        .list_all_paths()
        .unwrap()
        .is_empty());
}

#[test]
fn storage_failure_during_update_keeps_previous_state() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal", "Basim", "Dana"]);
    let id = fx
        .coordinator()
        .create(c100(), &ids, 1, &mut pdf("first"))
        .unwrap();
    let store = blocked_store(&fx);

    let patch = CommitteePatch {
        title: FieldPatch::Set("Renamed".to_string()),
        notes: FieldPatch::Set("should not stick".to_string()),
        ..CommitteePatch::default()
    };
    let mut upload = pdf("second");
    let err = CommitteeCoordinator::new(&mut fx.conn, &store, Duration::ZERO)
        .update(
            id,
            patch,
            Some(&ids[..1]),
            Some(&mut upload as &mut dyn Read),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)), "unexpected error: {err}");

    let view = AggregateReader::new(&fx.conn).get_by_id(id).unwrap();
    assert_eq!(view.committee.title, "Procurement review");
    assert_eq!(view.committee.notes, None);
    assert_eq!(view.employee_count, 3);
    assert_eq!(view.attachment_count, 1);
    assert_eq!(committee_count(&fx), 1);
}

#[test]
fn delete_attachment_hides_row_immediately_and_removes_file_later() {
    let mut fx = Fixture::new();
    let id = fx
        .coordinator()
        .create(c100(), &[], 1, &mut pdf("a"))
        .unwrap();
    let view = AggregateReader::new(&fx.conn).get_by_id(id).unwrap();
    let attachment = view.attachments[0].attachment.clone();

    fx.coordinator().delete_attachment(attachment.id).unwrap();
    assert_eq!(
        AggregateReader::new(&fx.conn).get_by_id(id).unwrap().attachment_count,
        0
    );
    assert!(matches!(
        fx.coordinator().delete_attachment(attachment.id),
        Err(CoreError::AttachmentNotFound(_))
    ));

    let Fixture { queue, .. } = fx;
    let stats = queue.shutdown();
    assert_eq!(stats.scheduled, 1);
    assert_eq!(stats.removed, 1);
    assert!(!attachment.path.exists());
}

#[test]
fn delete_committee_removes_files_and_reports_failures() {
    let mut fx = Fixture::new();
    let ids = seed_employees(&fx.conn, &["Amal"]);
    let id = fx
        .coordinator()
        .create(c100(), &ids, 1, &mut pdf("a"))
        .unwrap();
    let mut extra = pdf("b");
    fx.coordinator()
        .update(id, CommitteePatch::default(), None, Some(&mut extra as &mut dyn Read), 1)
        .unwrap();

    let paths = SqliteAttachmentRepository::new(&fx.conn).list_all_paths().unwrap();
    assert_eq!(paths.len(), 2);
    fs::remove_file(&paths[1]).unwrap();

    let report = fx.coordinator().delete_committee(id).unwrap();
    assert_eq!(report.committee_id, id);
    assert_eq!(report.removed, vec![paths[0].clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, paths[1]);
    assert!(!paths[0].exists());

    assert!(matches!(
        AggregateReader::new(&fx.conn).get_by_id(id),
        Err(CoreError::CommitteeNotFound(_))
    ));
    let members: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM committee_employees;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(members, 0);
    assert!(SqliteAttachmentRepository::new(&fx.conn)
        .list_all_paths()
        .unwrap()
        .is_empty());
    assert!(matches!(
        fx.coordinator().delete_committee(id),
        Err(CoreError::CommitteeNotFound(_))
    ));
}

#[test]
fn rejects_committee_numbers_unusable_as_file_names() {
    let mut fx = Fixture::new();
    let bad = NewCommittee::new("../etc", date(2024, 3, 1), "t", "b");
    let err = fx.coordinator().create(bad, &[], 1, &mut pdf("a")).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}
