//! Single-consumer background writer.
//!
//! The embedded store serializes writers; funneling every producer through
//! one background thread avoids `database is locked` contention and batches
//! commits. The store's connection type is not `Send`, so the writer owns it
//! on a dedicated `spawn_blocking` worker and is driven by a channel with a
//! shutdown sentinel, the same shape used elsewhere in this codebase's
//! ancestry for non-`Send` backend handles.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::models::{Measurement, Metric, Parameter};
use crate::store::schema;

const DEFAULT_BATCH_SIZE: usize = 2;
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A tagged item destined for one of the three append-only tables, or a
/// request to clear an experiment's metrics before recomputation.
#[derive(Debug)]
pub enum WriteItem {
    Measurement(Measurement),
    Metric(Metric),
    Parameter(Parameter),
    ClearMetrics(i64),
}

enum Command {
    Item(WriteItem),
    Shutdown,
}

/// Handle to the background writer. Cheap to clone; all clones share the
/// same worker thread and pending-item counter.
#[derive(Clone)]
pub struct WriteQueue {
    tx: std::sync::mpsc::Sender<Command>,
    pending: Arc<AtomicI64>,
}

/// Owns the join handle for the worker thread; dropping this without calling
/// [`WriteQueue::stop`] leaves the worker running until the process exits.
pub struct WriteQueueHandle {
    queue: WriteQueue,
    worker: JoinHandle<()>,
}

impl WriteQueueHandle {
    pub fn queue(&self) -> WriteQueue {
        self.queue.clone()
    }

    /// Send the shutdown sentinel, wait for the queue to drain, then join
    /// the worker thread.
    pub async fn stop(self) {
        let _ = self.queue.tx.send(Command::Shutdown);
        self.queue.wait_for_write(DEFAULT_WAIT_TIMEOUT).await;
        let _ = self.worker.await;
    }
}

impl WriteQueue {
    /// Spawn the background writer against the store at `path`, batching up
    /// to `batch_size` items (flushing sooner on a 100ms timer).
    pub fn spawn(path: PathBuf, batch_size: usize) -> WriteQueueHandle {
        let (tx, rx) = std::sync::mpsc::channel::<Command>();
        let pending = Arc::new(AtomicI64::new(0));
        let pending_worker = pending.clone();
        let batch_size = batch_size.max(1);
        let worker = tokio::task::spawn_blocking(move || {
            run_worker(path, rx, batch_size, pending_worker);
        });
        let queue = WriteQueue { tx, pending };
        WriteQueueHandle { queue, worker }
    }

    /// Enqueue an item. Never blocks: the underlying channel is unbounded.
    pub fn enqueue(&self, item: WriteItem) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Command::Item(item)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("write queue worker has already shut down; dropping item");
        }
    }

    /// Block (asynchronously) until every enqueued item prior to this call
    /// has been committed, or `timeout` elapses. Returns whether the queue
    /// drained before the deadline.
    pub async fn wait_for_write(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.pending.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    pub fn pending_count(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

fn run_worker(
    path: PathBuf,
    rx: std::sync::mpsc::Receiver<Command>,
    batch_size: usize,
    pending: Arc<AtomicI64>,
) {
    let conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(error = %err, path = %path.display(), "write queue worker failed to open store; draining all writes as lost");
            drain_as_lost(rx, &pending);
            return;
        }
    };
    if let Err(err) = schema::init(&conn) {
        error!(error = %err, "write queue worker failed to initialize schema");
    }

    let mut batch: Vec<WriteItem> = Vec::with_capacity(batch_size);
    loop {
        match rx.recv_timeout(FLUSH_INTERVAL) {
            Ok(Command::Item(item)) => {
                batch.push(item);
                if batch.len() >= batch_size {
                    flush(&conn, &mut batch, &pending);
                }
            }
            Ok(Command::Shutdown) => {
                flush(&conn, &mut batch, &pending);
                break;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                flush(&conn, &mut batch, &pending);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                flush(&conn, &mut batch, &pending);
                break;
            }
        }
    }
}

fn drain_as_lost(rx: std::sync::mpsc::Receiver<Command>, pending: &Arc<AtomicI64>) {
    for cmd in rx {
        match cmd {
            Command::Item(_) => {
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Command::Shutdown => break,
        }
    }
}

fn flush(conn: &Connection, batch: &mut Vec<WriteItem>, pending: &Arc<AtomicI64>) {
    if batch.is_empty() {
        return;
    }
    let tx = match conn.unchecked_transaction() {
        Ok(tx) => tx,
        Err(err) => {
            error!(error = %err, "failed to open write transaction; dropping batch");
            pending.fetch_sub(batch.len() as i64, Ordering::SeqCst);
            batch.clear();
            return;
        }
    };
    for item in batch.drain(..) {
        if let Err(err) = apply(&tx, &item) {
            warn!(error = %err, "failed to apply write item; item is lost");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    if let Err(err) = tx.commit() {
        error!(error = %err, "failed to commit write batch");
    }
}

fn apply(conn: &Connection, item: &WriteItem) -> rusqlite::Result<()> {
    match item {
        WriteItem::Measurement(m) => {
            conn.execute(
                "INSERT INTO measurements (experiment_id, n_input, n_output, ttft, start_time, end_time, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    m.experiment_id,
                    m.n_input,
                    m.n_output,
                    m.ttft,
                    m.start_time,
                    m.end_time,
                    m.status.as_str()
                ],
            )?;
        }
        WriteItem::Metric(metric) => {
            conn.execute(
                "INSERT INTO metrics (experiment_id, metric_name, metric_value, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    metric.experiment_id,
                    metric.metric_name,
                    metric.metric_value,
                    metric.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
                ],
            )?;
        }
        WriteItem::Parameter(p) => {
            conn.execute(
                "INSERT INTO parameters (experiment_id, key, value) VALUES (?1, ?2, ?3)",
                rusqlite::params![p.experiment_id, p.key, p.value],
            )?;
        }
        WriteItem::ClearMetrics(experiment_id) => {
            conn.execute(
                "DELETE FROM metrics WHERE experiment_id = ?1",
                [*experiment_id],
            )?;
        }
    }
    Ok(())
}
