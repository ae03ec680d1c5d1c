//! Database bootstrap for the committee store.
//!
//! Connections come out of [`open_db`] / [`open_db_in_memory`] migrated and
//! checked; repositories assume the full committee schema from then on.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// `user_version` is current but committee tables are gone.
    IncompleteSchema {
        version: u32,
        missing_tables: Vec<&'static str>,
    },
}

impl DbError {
    /// Stable token for the `error_code` log field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
            Self::IncompleteSchema { .. } => "incomplete_schema",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "committee database is at schema {db_version}, this build supports up to {latest_supported}"
            ),
            Self::IncompleteSchema {
                version,
                missing_tables,
            } => write!(
                f,
                "committee database at schema {version} is missing tables: {}",
                missing_tables.join(", ")
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::IncompleteSchema { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
