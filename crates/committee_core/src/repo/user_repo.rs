//! Minimal user lookups: the core only needs usernames for read views.

use crate::model::validation::require_text;
use crate::repo::committee_repo::RepoResult;
use crate::repo::in_placeholders;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};

pub trait UserRepository {
    fn insert_user(&self, username: &str) -> RepoResult<i64>;
    fn username(&self, user_id: i64) -> RepoResult<Option<String>>;
    /// Resolves many ids at once; unknown ids are absent from the map.
    fn usernames(&self, user_ids: &[i64]) -> RepoResult<HashMap<i64, String>>;
    fn count_users(&self) -> RepoResult<u64>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn insert_user(&self, username: &str) -> RepoResult<i64> {
        let username = require_text("username", username)?;
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1);", [username])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn username(&self, user_id: i64) -> RepoResult<Option<String>> {
        let username = self
            .conn
            .query_row(
                "SELECT username FROM users WHERE id = ?1;",
                [user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(username)
    }

    fn usernames(&self, user_ids: &[i64]) -> RepoResult<HashMap<i64, String>> {
        let ids: BTreeSet<i64> = user_ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT id, username FROM users WHERE id IN ({});",
            in_placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut names = HashMap::with_capacity(ids.len());
        for row in rows {
            let (id, name) = row?;
            names.insert(id, name);
        }
        Ok(names)
    }

    fn count_users(&self) -> RepoResult<u64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get::<_, i64>(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
