mod common;

use committee_core::repo::{MembershipRepository, SqliteMembershipRepository};
use committee_core::{
    open_db_in_memory, AggregateReader, CommitteeFilter, CommitteeListQuery, CoreError,
    SortField, SortOrder, ValidationError,
};
use common::{date, pdf, seed_committee, seed_employees, seed_user, Fixture};
use std::collections::BTreeSet;
use std::fs;

fn collect_all_pages(reader: &AggregateReader<'_>, mut query: CommitteeListQuery) -> (u64, Vec<i64>) {
    let mut ids = Vec::new();
    let first = reader.list_page(&query).unwrap();
    let total = first.total;
    let total_pages = first.total_pages;
    ids.extend(first.items.iter().map(|item| item.committee.id));
    for page in 2..=total_pages {
        query.page = u32::try_from(page).unwrap();
        let result = reader.list_page(&query).unwrap();
        assert_eq!(result.total, total);
        ids.extend(result.items.iter().map(|item| item.committee.id));
    }
    (total, ids)
}

#[test]
fn pages_cover_every_committee_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    // Same number in several years, plus ties on the sort column.
    for index in 0..23 {
        let year = 2020 + (index % 3);
        seed_committee(
            &conn,
            &format!("N-{}", index / 3),
            date(year, 1 + (index % 12) as u32, 1),
            "Shared title",
            "Boss",
            None,
        );
    }
    let reader = AggregateReader::new(&conn);

    for sort_field in [SortField::Id, SortField::Title, SortField::CommitteeNo] {
        for sort_order in [SortOrder::Asc, SortOrder::Desc] {
            let query = CommitteeListQuery {
                page_size: 5,
                sort_field,
                sort_order,
                ..CommitteeListQuery::default()
            };
            let (total, ids) = collect_all_pages(&reader, query);
            assert_eq!(total, 23);
            assert_eq!(ids.len(), 23, "{sort_field:?} {sort_order:?}");
            let unique: BTreeSet<i64> = ids.iter().copied().collect();
            assert_eq!(unique.len(), 23, "{sort_field:?} {sort_order:?}");
        }
    }
}

#[test]
fn page_metadata_and_serial_numbers() {
    let conn = open_db_in_memory().unwrap();
    for index in 0..12 {
        seed_committee(&conn, &format!("S-{index}"), date(2024, 2, 1), "T", "B", None);
    }
    let reader = AggregateReader::new(&conn);

    let query = CommitteeListQuery {
        page: 3,
        page_size: 5,
        sort_order: SortOrder::Asc,
        ..CommitteeListQuery::default()
    };
    let page = reader.list_page(&query).unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 2);
    assert!(!page.has_next);
    assert!(page.has_previous);
    let serials: Vec<u64> = page.items.iter().map(|item| item.serial_no).collect();
    assert_eq!(serials, [11, 12]);

    let beyond = CommitteeListQuery { page: 9, ..query };
    let empty = reader.list_page(&beyond).unwrap();
    assert!(empty.items.is_empty());
    assert_eq!(empty.total, 12);
}

#[test]
fn filters_combine_and_match_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let boss = seed_user(&conn, "clerk");
    seed_committee(&conn, "F-1", date(2024, 1, 10), "Annual Budget", "Sara Ali", Some(boss));
    seed_committee(&conn, "F-2", date(2024, 2, 10), "budget appeal", "Omar", None);
    seed_committee(&conn, "F-3", date(2024, 3, 10), "Hiring", "sara ali", None);
    seed_committee(&conn, "F-1", date(2023, 5, 10), "Old budget", "Sara Ali", None);
    let reader = AggregateReader::new(&conn);

    let list = |filter: CommitteeFilter| {
        let query = CommitteeListQuery {
            filter,
            sort_order: SortOrder::Asc,
            ..CommitteeListQuery::default()
        };
        reader.list_page(&query).unwrap()
    };

    let by_title = list(CommitteeFilter {
        title: Some("BUDGET".to_string()),
        ..CommitteeFilter::default()
    });
    assert_eq!(by_title.total, 3);

    let by_boss_and_range = list(CommitteeFilter {
        boss_name: Some(" sara ".to_string()),
        date_from: Some(date(2024, 1, 1)),
        date_to: Some(date(2024, 3, 10)),
        ..CommitteeFilter::default()
    });
    assert_eq!(by_boss_and_range.total, 2);

    let by_number = list(CommitteeFilter {
        committee_no: Some(" F-1 ".to_string()),
        ..CommitteeFilter::default()
    });
    assert_eq!(by_number.total, 2);
    assert_eq!(by_number.items[0].submitted_by.as_deref(), Some("clerk"));
    assert_eq!(by_number.items[1].submitted_by, None);

    let query = CommitteeListQuery {
        filter: CommitteeFilter {
            date_from: Some(date(2024, 5, 1)),
            date_to: Some(date(2024, 1, 1)),
            ..CommitteeFilter::default()
        },
        ..CommitteeListQuery::default()
    };
    assert!(matches!(
        reader.list_page(&query),
        Err(CoreError::Validation(ValidationError::InvalidDateRange { .. }))
    ));
}

#[test]
fn page_items_carry_attachments_and_member_counts() {
    let mut fx = Fixture::new();
    let actor = seed_user(&fx.conn, "uploader");
    let ids = seed_employees(&fx.conn, &["Amal", "Basim"]);
    let with_files = fx
        .coordinator()
        .create(
            committee_core::NewCommittee::new("P-1", date(2024, 4, 1), "T", "B"),
            &ids,
            actor,
            &mut pdf("one"),
        )
        .unwrap();
    let bare = seed_committee(&fx.conn, "P-2", date(2024, 4, 2), "T", "B", None);

    let reader = AggregateReader::new(&fx.conn);
    let page = reader.list_page(&CommitteeListQuery::default()).unwrap();
    assert_eq!(page.total, 2);

    let first = page.items.iter().find(|i| i.committee.id == with_files).unwrap();
    assert_eq!(first.employee_count, 2);
    assert_eq!(first.attachments.len(), 1);
    assert_eq!(first.attachments[0].uploaded_by.as_deref(), Some("uploader"));

    let second = page.items.iter().find(|i| i.committee.id == bare).unwrap();
    assert_eq!(second.employee_count, 0);
    assert!(second.attachments.is_empty());
}

#[test]
fn attachment_lookup_views() {
    let mut fx = Fixture::new();
    let id = fx
        .coordinator()
        .create(
            committee_core::NewCommittee::new("L-9", date(2024, 4, 1), "T", "B"),
            &[],
            1,
            &mut pdf("one"),
        )
        .unwrap();
    let reader = AggregateReader::new(&fx.conn);

    let by_no = reader.attachments_by_committee_no("L-9").unwrap();
    assert_eq!(by_no.len(), 1);
    assert!(reader.attachments_by_committee_no("L-10").unwrap().is_empty());

    let served = reader.attachment_file(by_no[0].id, fx.root.path()).unwrap();
    assert_eq!(served, by_no[0].path);

    let elsewhere = tempfile::tempdir().unwrap();
    assert!(matches!(
        reader.attachment_file(by_no[0].id, elsewhere.path()),
        Err(CoreError::Validation(_))
    ));

    fs::remove_file(&served).unwrap();
    assert!(matches!(
        reader.attachment_file(by_no[0].id, fx.root.path()),
        Err(CoreError::AttachmentNotFound(_))
    ));
    assert!(matches!(
        reader.attachment_file(999, fx.root.path()),
        Err(CoreError::AttachmentNotFound(999))
    ));

    assert_eq!(reader.committee_employees(id).unwrap().len(), 0);
    assert!(matches!(
        reader.committee_employees(id + 1),
        Err(CoreError::CommitteeNotFound(_))
    ));
}

#[test]
fn lookups_suggestions_reports_and_counts() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    seed_user(&conn, "idle");
    seed_committee(&conn, "7", date(2024, 1, 5), "Budget review", "Sara", Some(alice));
    seed_committee(&conn, "3", date(2024, 2, 5), "budget appeal", "Samir", Some(alice));
    seed_committee(&conn, "7", date(2023, 6, 5), "Hiring", "Omar", Some(bob));
    let reader = AggregateReader::new(&conn);

    assert!(reader.committee_no_exists("7", date(2024, 12, 31)).unwrap());
    assert!(!reader.committee_no_exists("3", date(2023, 1, 1)).unwrap());
    assert_eq!(reader.distinct_committee_numbers().unwrap(), ["3", "7"]);
    assert_eq!(reader.last_committee_no().unwrap().as_deref(), Some("7"));

    assert_eq!(
        reader.title_suggestions("BUDGET", 10).unwrap(),
        ["Budget review", "budget appeal"]
    );
    assert_eq!(reader.title_suggestions("budget", 0).unwrap().len(), 1);
    assert_eq!(reader.boss_name_suggestions("sa", 5).unwrap(), ["Samir", "Sara"]);

    let report = reader
        .report_by_date_range(date(2023, 1, 1), date(2024, 1, 31))
        .unwrap();
    let dates: Vec<_> = report.iter().map(|row| row.committee.committee_date).collect();
    assert_eq!(dates, [date(2023, 6, 5), date(2024, 1, 5)]);
    assert_eq!(report[0].submitted_by.as_deref(), Some("bob"));
    assert!(reader
        .report_by_date_range(date(2024, 2, 1), date(2024, 1, 1))
        .is_err());

    let counts = reader.dashboard_counts().unwrap();
    assert_eq!(counts.total_committees, 3);
    assert_eq!(counts.total_users, 3);
    assert_eq!(counts.per_user.len(), 2);
    assert_eq!(counts.per_user[0].username, "alice");
    assert_eq!(counts.per_user[0].committees, 2);
}

#[test]
fn get_by_id_reports_missing_committee() {
    let conn = open_db_in_memory().unwrap();
    let reader = AggregateReader::new(&conn);
    assert!(matches!(
        reader.get_by_id(12),
        Err(CoreError::CommitteeNotFound(12))
    ));
    let id = seed_committee(&conn, "G-1", date(2024, 1, 1), "T", "B", None);
    let view = reader.get_by_id(id).unwrap();
    assert_eq!(view.employee_count, 0);
    assert!(view.attachments.is_empty());
    assert_eq!(
        SqliteMembershipRepository::new(&conn).member_count(id).unwrap(),
        0
    );
}

#[test]
fn employee_lookup_returns_row_or_not_found() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_employees(&conn, &["Amal"]);
    let reader = AggregateReader::new(&conn);

    let employee = reader.employee(ids[0]).unwrap();
    assert_eq!(employee.name, "Amal");
    assert_eq!(employee.employee_desc, Some(1000));

    let err = reader.employee(ids[0] + 100).unwrap_err();
    assert!(matches!(err, CoreError::EmployeeNotFound(id) if id == ids[0] + 100));
    assert!(err.is_client_error());
    assert_eq!(err.code(), "employee_not_found");
}
