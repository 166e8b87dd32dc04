//! DDL for the embedded relational store.

use rusqlite::Connection;

use crate::error::Result;

/// Create all tables if they do not already exist, and tune the connection
/// for a single dedicated writer plus many concurrent readers.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS experiments (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_name TEXT NOT NULL,
            experiment_date DATETIME NOT NULL,
            description     TEXT
        );

        CREATE TABLE IF NOT EXISTS parameters (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_id INTEGER NOT NULL REFERENCES experiments(id),
            key           TEXT NOT NULL,
            value         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metrics (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_id INTEGER NOT NULL REFERENCES experiments(id),
            metric_name   TEXT NOT NULL,
            metric_value  REAL NOT NULL,
            timestamp     DATETIME NOT NULL
        );

        CREATE TABLE IF NOT EXISTS measurements (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_id INTEGER NOT NULL REFERENCES experiments(id),
            n_input       INTEGER NOT NULL,
            n_output      INTEGER NOT NULL,
            ttft          REAL NOT NULL,
            start_time    REAL NOT NULL,
            end_time      REAL NOT NULL,
            status        TEXT NOT NULL CHECK (status IN ('success', 'failed'))
        );

        CREATE INDEX IF NOT EXISTS idx_parameters_experiment ON parameters(experiment_id);
        CREATE INDEX IF NOT EXISTS idx_metrics_experiment ON metrics(experiment_id);
        CREATE INDEX IF NOT EXISTS idx_measurements_experiment ON measurements(experiment_id);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 4);
    }
}
