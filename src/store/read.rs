//! Read-only fetches against the embedded store.
//!
//! All other components, including the analyzer, read through short-lived
//! connections rather than the single writer handle. Lock contention on read
//! is retried with backoff via [`crate::store::retry::with_retry`].

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::Result;
use crate::models::{Measurement, Metric, Parameter, Status};
use crate::store::retry::with_retry;

/// Fetch all measurements belonging to `experiment_id`.
pub fn fetch_measurements(conn: &Connection, experiment_id: i64) -> Result<Vec<Measurement>> {
    with_retry(|| {
        let mut stmt = conn.prepare(
            "SELECT id, experiment_id, n_input, n_output, ttft, start_time, end_time, status
             FROM measurements WHERE experiment_id = ?1",
        )?;
        let rows = stmt.query_map([experiment_id], row_to_measurement)?;
        rows.collect()
    })
    .map_err(Into::into)
}

/// Fetch measurements belonging to `experiment_id` whose `start_time` falls
/// within `[start, end)`. Used by the stress runner's windowed analysis.
pub fn fetch_measurements_in_range(
    conn: &Connection,
    experiment_id: i64,
    start: f64,
    end: f64,
) -> Result<Vec<Measurement>> {
    with_retry(|| {
        let mut stmt = conn.prepare(
            "SELECT id, experiment_id, n_input, n_output, ttft, start_time, end_time, status
             FROM measurements
             WHERE experiment_id = ?1 AND start_time >= ?2 AND start_time < ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![experiment_id, start, end], row_to_measurement)?;
        rows.collect()
    })
    .map_err(Into::into)
}

fn row_to_measurement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Measurement> {
    let status_str: String = row.get(7)?;
    let status = status_str.parse::<Status>().unwrap_or(Status::Failed);
    Ok(Measurement {
        id: row.get(0)?,
        experiment_id: row.get(1)?,
        n_input: row.get(2)?,
        n_output: row.get(3)?,
        ttft: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        status,
    })
}

/// Fetch all parameters belonging to `experiment_id`.
pub fn fetch_parameters(conn: &Connection, experiment_id: i64) -> Result<Vec<Parameter>> {
    with_retry(|| {
        let mut stmt =
            conn.prepare("SELECT id, experiment_id, key, value FROM parameters WHERE experiment_id = ?1")?;
        let rows = stmt.query_map([experiment_id], |row| {
            Ok(Parameter {
                id: row.get(0)?,
                experiment_id: row.get(1)?,
                key: row.get(2)?,
                value: row.get(3)?,
            })
        })?;
        rows.collect()
    })
    .map_err(Into::into)
}

/// Fetch all metrics belonging to `experiment_id`.
pub fn fetch_metrics(conn: &Connection, experiment_id: i64) -> Result<Vec<Metric>> {
    with_retry(|| {
        let mut stmt = conn.prepare(
            "SELECT id, experiment_id, metric_name, metric_value, timestamp
             FROM metrics WHERE experiment_id = ?1",
        )?;
        let rows = stmt.query_map([experiment_id], |row| {
            let timestamp: String = row.get(4)?;
            let timestamp = parse_timestamp(&timestamp);
            Ok(Metric {
                id: row.get(0)?,
                experiment_id: row.get(1)?,
                metric_name: row.get(2)?,
                metric_value: row.get(3)?,
                timestamp,
            })
        })?;
        rows.collect()
    })
    .map_err(Into::into)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
