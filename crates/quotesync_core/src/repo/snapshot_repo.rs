//! Snapshot repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide a stable read/write API over fixed-key serialized documents.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `write` is a total replace for its key, never an append.
//! - Construction fails fast on an unmigrated or incompatible schema
//!   instead of masking it at first query.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence-layer error for snapshot access.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; run migrations first"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key-value access contract for serialized snapshot documents.
pub trait SnapshotRepository {
    /// Reads the document stored under `key`, if any.
    fn read(&self, key: &str) -> RepoResult<Option<String>>;
    /// Replaces the document stored under `key`.
    fn write(&self, key: &str, value: &str) -> RepoResult<()>;
}

/// SQLite-backed snapshot repository.
///
/// Owns its connection so a store built on top can be moved across threads
/// (`Connection` is `Send`); concurrent use is serialized by the caller,
/// typically behind a `Mutex`.
pub struct SqliteSnapshotRepository {
    conn: Connection,
}

impl SqliteSnapshotRepository {
    /// Wraps a connection after verifying it is migrated and compatible.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` does not match
    ///   the latest known migration.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the expected
    ///   `kv_store` shape is absent.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        require_column(&conn, "kv_store", "key")?;
        require_column(&conn, "kv_store", "value")?;

        Ok(Self { conn })
    }

    /// Consumes the repository, handing back the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl SnapshotRepository for SqliteSnapshotRepository {
    fn read(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }
}

fn require_column(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
) -> RepoResult<()> {
    // Preparing a zero-row probe resolves both table and column names.
    match conn.prepare(&format!("SELECT {column} FROM {table} LIMIT 0;")) {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(_, Some(message)))
            if message.contains("no such table") =>
        {
            Err(RepoError::MissingRequiredTable(table))
        }
        Err(rusqlite::Error::SqliteFailure(_, Some(message)))
            if message.contains("no such column") =>
        {
            Err(RepoError::MissingRequiredColumn { table, column })
        }
        Err(rusqlite::Error::SqlInputError { ref msg, .. }) if msg.contains("no such column") => {
            Err(RepoError::MissingRequiredColumn { table, column })
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::{RepoError, SnapshotRepository, SqliteSnapshotRepository};
    use crate::db::migrations::latest_version;
    use crate::db::open_db_in_memory;
    use rusqlite::Connection;

    #[test]
    fn read_returns_none_for_missing_key() {
        let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();
        assert_eq!(repo.read("quotes_v1").unwrap(), None);
    }

    #[test]
    fn write_then_read_roundtrips_and_replaces() {
        let repo = SqliteSnapshotRepository::try_new(open_db_in_memory().unwrap()).unwrap();

        repo.write("quotes_v1", "[1]").unwrap();
        assert_eq!(repo.read("quotes_v1").unwrap().as_deref(), Some("[1]"));

        repo.write("quotes_v1", "[1,2]").unwrap();
        assert_eq!(repo.read("quotes_v1").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn try_new_rejects_uninitialized_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let result = SqliteSnapshotRepository::try_new(conn);
        match result {
            Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version: 0,
            }) => assert!(expected_version > 0),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected uninitialized connection error"),
        }
    }

    #[test]
    fn try_new_rejects_connection_without_kv_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
            .unwrap();

        let result = SqliteSnapshotRepository::try_new(conn);
        assert!(matches!(
            result,
            Err(RepoError::MissingRequiredTable("kv_store"))
        ));
    }

    #[test]
    fn try_new_rejects_connection_missing_value_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE kv_store (key TEXT PRIMARY KEY NOT NULL);")
            .unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
            .unwrap();

        let result = SqliteSnapshotRepository::try_new(conn);
        assert!(matches!(
            result,
            Err(RepoError::MissingRequiredColumn {
                table: "kv_store",
                column: "value"
            })
        ));
    }
}
