//! Embedded relational store: schema, read path, and retry-with-backoff.
//!
//! Writes never go through this module directly — see [`crate::write_queue`]
//! for the single-writer pipeline. This module is for the read-only
//! connections every other component uses, plus the DDL the writer applies
//! once at startup.

pub mod read;
pub mod retry;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::Result;
use crate::models::Experiment;

/// A handle to the store's location, used to open short-lived read-only
/// connections. Does not itself hold an open connection.
#[derive(Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if absent) the store at `path`, applying schema DDL,
    /// and return a handle for subsequent read connections.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        schema::init(&conn)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh read connection against the store's path.
    pub fn read_connection(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Create an experiment row and return its assigned id. Done outside the
    /// write queue because callers need the id synchronously, before any
    /// measurement can be produced.
    pub fn create_experiment(&self, experiment: &Experiment) -> Result<i64> {
        let conn = self.read_connection()?;
        conn.execute(
            "INSERT INTO experiments (experiment_name, experiment_date, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                experiment.experiment_name,
                experiment.experiment_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                experiment.description,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.db");
        let store = Store::open(&path).unwrap();
        let conn = store.read_connection().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 4);
    }

    #[test]
    fn create_experiment_assigns_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("bench.db")).unwrap();
        let experiment = crate::models::Experiment::new("run-1", None);
        let id = store.create_experiment(&experiment).unwrap();
        assert!(id > 0);
    }
}
