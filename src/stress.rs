//! Continuous stress mode: an unbounded dispatch loop paired with a periodic
//! windowed-metrics computation, until the caller signals a stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, info_span, warn, Instrument};

use crate::analyzer;
use crate::error::Result;
use crate::http_pool::ClientPool;
use crate::models::{Metric, Parameter};
use crate::runner::InferenceRunner;
use crate::signing::Signer;
use crate::store::read::fetch_measurements_in_range;
use crate::store::Store;
use crate::write_queue::{WriteItem, WriteQueue};

const PACER_INTERVAL: Duration = Duration::from_millis(10);

pub struct StressConfig {
    pub experiment_id: i64,
    pub endpoint: String,
    pub model: String,
    pub num_runners: usize,
    pub max_tokens: u32,
    pub seed: u64,
    pub prompts: Vec<String>,
    pub signer: Option<Signer>,
    pub account_address: String,
    pub api_key: Option<String>,
    pub report_freq_min: f64,
}

/// Cooperative stop flag. `Ctrl-C` handlers (or tests) flip this to request a
/// transition from RUNNING to STOPPING within one pacer tick.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run the continuous stress loop until `stop` is signalled. Returns once
/// in-flight requests are abandoned and the write queue has drained
/// (TERMINATED).
pub async fn run_stress(
    config: StressConfig,
    store: &Store,
    write_queue: WriteQueue,
    stop: StopSignal,
) -> Result<()> {
    let experiment_start = now_secs();
    let window_secs = (config.report_freq_min * 60.0).max(1.0);
    let experiment_id = config.experiment_id;
    let max_tokens = config.max_tokens;

    let pool = Arc::new(ClientPool::for_runners(config.num_runners)?);
    let runner = InferenceRunner::new(
        pool,
        &config.endpoint,
        &config.model,
        config.signer,
        &config.account_address,
        config.api_key.clone(),
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.num_runners.max(1)));
    let mut in_flight = tokio::task::JoinSet::new();

    let mut next_window_deadline = experiment_start + window_secs;
    let mut window_index: u64 = 1;
    let mut task_index: u64 = 0;
    let mut pacer = tokio::time::interval(PACER_INTERVAL);

    loop {
        pacer.tick().await;
        if stop.is_stopped() {
            break;
        }

        if now_secs() >= next_window_deadline {
            compute_window(store, &write_queue, experiment_id, experiment_start, window_index).await;
            window_index += 1;
            next_window_deadline = experiment_start + window_index as f64 * window_secs;
        }

        // Reap finished tasks so the semaphore's permits are released promptly.
        while in_flight.try_join_next().is_some() {}

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => continue,
        };

        let idx = rng.gen_range(0..config.prompts.len().max(1));
        let prompt = config.prompts.get(idx).cloned().unwrap_or_default();
        let runner = runner.clone();
        let write_queue = write_queue.clone();
        in_flight.spawn(async move {
            let measurement = runner
                .run_inference(experiment_id, &prompt, max_tokens, task_index)
                .await;
            write_queue.enqueue(WriteItem::Measurement(measurement));
            drop(permit);
        });
        task_index += 1;
    }

    // STOPPING: the in-flight pool is abandoned rather than awaited, then
    // the write queue is drained before TERMINATED.
    in_flight.abort_all();
    write_queue.wait_for_write(Duration::from_secs(10)).await;
    info!(experiment_id, "stress run terminated");
    Ok(())
}

async fn compute_window(
    store: &Store,
    write_queue: &WriteQueue,
    experiment_id: i64,
    experiment_start: f64,
    window_index: u64,
) {
    let span = info_span!("stress_window", experiment_id, window_index);
    compute_window_inner(store, write_queue, experiment_id, experiment_start, window_index)
        .instrument(span)
        .await
}

/// Cumulative window: includes every measurement from `experiment_start`
/// onward, so `_window_k` reads as the running average at time k (see the
/// stress-mode windowing rationale).
async fn compute_window_inner(
    store: &Store,
    write_queue: &WriteQueue,
    experiment_id: i64,
    experiment_start: f64,
    window_index: u64,
) {
    let store = store.clone();
    let fetch_result = tokio::task::spawn_blocking(move || {
        let conn = store.read_connection()?;
        fetch_measurements_in_range(&conn, experiment_id, experiment_start, f64::MAX)
    })
    .await;
    let measurements = match fetch_result {
        Ok(Ok(m)) => m,
        Ok(Err(err)) => {
            warn!(error = %err, "failed to fetch measurements for windowed analysis");
            return;
        }
        Err(err) => {
            warn!(error = %err, "windowed analysis blocking task failed");
            return;
        }
    };

    if measurements.is_empty() {
        warn!(window_index, "no measurements in window; skipping metric computation");
        return;
    }

    match analyzer::compute_metrics(&measurements, experiment_id) {
        Ok(metrics) => {
            for (name, value) in metrics.iter() {
                let windowed_name = format!("{name}_window_{window_index}");
                write_queue.enqueue(WriteItem::Metric(Metric::new(
                    experiment_id,
                    windowed_name,
                    value,
                )));
            }
            let stats = analyzer::compute_input_output_stats(&measurements);
            for (key, value) in [
                ("avg_n_input", stats.avg_n_input),
                ("std_n_input", stats.std_n_input),
                ("avg_n_output", stats.avg_n_output),
                ("std_n_output", stats.std_n_output),
            ] {
                write_queue.enqueue(WriteItem::Parameter(Parameter::new(
                    experiment_id,
                    format!("{key}_window_{window_index}"),
                    value.to_string(),
                )));
            }
            info!(
                window_index,
                count = measurements.len(),
                "computed windowed metrics"
            );
        }
        Err(err) => {
            warn!(window_index, error = %err, "windowed metric computation failed");
        }
    }
}

fn now_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
