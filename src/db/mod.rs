//! SQLite-backed store for all CRM state.
//!
//! One `CrmDb` wraps one connection. Entity-specific queries live in the
//! sibling files of this module (`leads.rs`, `stages.rs`, …), each an
//! `impl CrmDb` block. Mutating services wrap their multi-write operations
//! in [`CrmDb::with_transaction`] so a lead insert, its activity append,
//! and the usage counter adjustment commit or roll back together.

use std::path::Path;

use rusqlite::Connection;

pub mod types;
pub use types::*;

mod leads;
mod lists;
mod notes;
mod stages;
mod tasks;
mod workspaces;

pub struct CrmDb {
    conn: Connection,
}

impl CrmDb {
    /// Open (or create) a database at `path` and apply pending migrations.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Open a fresh in-memory database. Used throughout the test suite.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::Sqlite(e)))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    #[test]
    fn test_open_at_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("crm.db");
        let db = CrmDb::open_at(&path).expect("open");
        assert!(path.exists());
        drop(db);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = CrmDb::open_in_memory().expect("db");
        db.with_transaction::<_, DbError, _>(|db| {
            db.conn_ref().execute(
                "INSERT INTO workspaces (id, owner_id, name, created_at)
                 VALUES ('w1', 'u1', 'Test', '2026-01-01')",
                params![],
            )?;
            Ok(())
        })
        .expect("tx");

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM workspaces", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = CrmDb::open_in_memory().expect("db");
        let result: Result<(), DbError> = db.with_transaction(|db| {
            db.conn_ref().execute(
                "INSERT INTO workspaces (id, owner_id, name, created_at)
                 VALUES ('w1', 'u1', 'Test', '2026-01-01')",
                params![],
            )?;
            Err(DbError::Migration("forced failure".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM workspaces", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0, "insert should have rolled back");
    }
}
