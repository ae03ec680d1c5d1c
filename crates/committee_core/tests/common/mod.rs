#![allow(dead_code)]

use chrono::NaiveDate;
use committee_core::repo::{
    CommitteeRepository, EmployeeRepository, SqliteCommitteeRepository, SqliteEmployeeRepository,
    SqliteUserRepository, UserRepository,
};
use committee_core::storage::{AttachmentStore, DeletionConfig, DeletionQueue};
use committee_core::{open_db_in_memory, CommitteeCoordinator, Gender, NewCommittee};
use rusqlite::Connection;
use std::io::Cursor;
use std::time::Duration;
use tempfile::TempDir;

pub struct Fixture {
    pub conn: Connection,
    pub store: AttachmentStore,
    pub queue: DeletionQueue,
    pub root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let queue = DeletionQueue::start(DeletionConfig {
            max_attempts: 2,
            retry_backoff: Duration::from_millis(5),
        })
        .unwrap();
        let store = AttachmentStore::new(root.path(), queue.handle()).unwrap();
        Self {
            conn: open_db_in_memory().unwrap(),
            store,
            queue,
            root,
        }
    }

    /// Coordinator with an immediate deferred-delete delay.
    pub fn coordinator(&mut self) -> CommitteeCoordinator<'_> {
        CommitteeCoordinator::new(&mut self.conn, &self.store, Duration::ZERO)
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn pdf(body: &str) -> Cursor<Vec<u8>> {
    Cursor::new(format!("%PDF-1.7\n{body}").into_bytes())
}

pub fn seed_user(conn: &Connection, username: &str) -> i64 {
    SqliteUserRepository::new(conn).insert_user(username).unwrap()
}

pub fn seed_employees(conn: &Connection, names: &[&str]) -> Vec<i64> {
    let repo = SqliteEmployeeRepository::new(conn);
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            repo.insert_employee(name, Some(1000 + index as i64), Gender::Unknown)
                .unwrap()
        })
        .collect()
}

/// Inserts a committee row without attachments or members.
pub fn seed_committee(
    conn: &Connection,
    committee_no: &str,
    committee_date: NaiveDate,
    title: &str,
    boss_name: &str,
    submitting_user_id: Option<i64>,
) -> i64 {
    SqliteCommitteeRepository::new(conn)
        .insert_committee(
            &NewCommittee::new(committee_no, committee_date, title, boss_name),
            committee_date,
            submitting_user_id,
        )
        .unwrap()
}
