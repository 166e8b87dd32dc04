//! Bounded experiment runner: dispatches a fixed task count across a worker
//! pool, then analyzes the resulting measurements.

use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::analyzer::{self, MetricSet};
use crate::error::Result;
use crate::http_pool::ClientPool;
use crate::models::{Measurement, Metric, Parameter};
use crate::runner::InferenceRunner;
use crate::signing::Signer;
use crate::store::read::fetch_measurements;
use crate::store::Store;
use crate::write_queue::{WriteItem, WriteQueue};

/// Everything needed to run one bounded experiment end to end.
pub struct BoundedExperimentConfig {
    pub experiment_id: i64,
    pub endpoint: String,
    pub model: String,
    pub num_runners: usize,
    pub num_tasks: usize,
    pub max_tokens: u32,
    pub seed: u64,
    pub prompts: Vec<String>,
    pub signer: Option<Signer>,
    pub account_address: String,
    pub api_key: Option<String>,
    pub no_sign: bool,
    pub old_sign: bool,
}

/// Run `config` to completion: dispatch all tasks, write parameters and
/// measurements, then compute and persist the metric catalog. Returns the
/// computed metrics.
pub async fn run_bounded(
    config: BoundedExperimentConfig,
    store: &Store,
    write_queue: &WriteQueue,
) -> Result<MetricSet> {
    let pool = std::sync::Arc::new(ClientPool::for_runners(config.num_runners)?);
    let runner = InferenceRunner::new(
        pool,
        &config.endpoint,
        &config.model,
        config.signer,
        &config.account_address,
        config.api_key.clone(),
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let task_prompts: Vec<String> = (0..config.num_tasks)
        .map(|_| {
            let idx = rng.gen_range(0..config.prompts.len().max(1));
            config.prompts.get(idx).cloned().unwrap_or_default()
        })
        .collect();

    let measurements_unordered = stream::iter(task_prompts.into_iter().enumerate())
        .map(|(task_index, prompt)| {
            let runner = &runner;
            async move {
                runner
                    .run_inference(config.experiment_id, &prompt, config.max_tokens, task_index as u64)
                    .await
            }
        })
        .buffer_unordered(config.num_runners.max(1));
    let handles: Vec<Measurement> = measurements_unordered.collect().await;

    let failed_count = handles.iter().filter(|m| m.status == crate::models::Status::Failed).count();
    if failed_count > 0 {
        warn!(failed_count, total = handles.len(), "some inference tasks failed");
    }

    write_parameters(&config, write_queue);
    for measurement in &handles {
        write_queue.enqueue(WriteItem::Measurement(measurement.clone()));
    }
    write_queue.wait_for_write(std::time::Duration::from_secs(10)).await;

    let store_for_fetch = store.clone();
    let experiment_id = config.experiment_id;
    let measurements = tokio::task::spawn_blocking(move || {
        let conn = store_for_fetch.read_connection()?;
        fetch_measurements(&conn, experiment_id)
    })
    .await??;
    let metrics = analyzer::compute_metrics(&measurements, config.experiment_id)?;

    write_queue.enqueue(WriteItem::ClearMetrics(config.experiment_id));
    for (name, value) in metrics.iter() {
        write_queue.enqueue(WriteItem::Metric(Metric::new(
            config.experiment_id,
            name.to_string(),
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
            config.experiment_id,
            key,
            value.to_string(),
        )));
    }
    write_queue.wait_for_write(std::time::Duration::from_secs(10)).await;

    info!(experiment_id = config.experiment_id, "bounded experiment complete");
    Ok(metrics)
}

fn write_parameters(config: &BoundedExperimentConfig, write_queue: &WriteQueue) {
    let params = [
        ("num_workers", config.num_runners.to_string()),
        ("num_tasks", config.num_tasks.to_string()),
        ("node_url", config.endpoint.clone()),
        ("max_tokens", config.max_tokens.to_string()),
        ("model_name", config.model.clone()),
        ("no_sign", config.no_sign.to_string()),
        ("old_sign", config.old_sign.to_string()),
    ];
    for (key, value) in params {
        write_queue.enqueue(WriteItem::Parameter(Parameter::new(
            config.experiment_id,
            key,
            value,
        )));
    }
    if !config.no_sign && !config.account_address.is_empty() {
        write_queue.enqueue(WriteItem::Parameter(Parameter::new(
            config.experiment_id,
            "requester_address",
            config.account_address.clone(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_experiment_config_fields_are_plain_data() {
        // Smoke test exercising the struct literal shape used by the
        // demonstration binary, so a field rename here fails loudly.
        let config = BoundedExperimentConfig {
            experiment_id: 1,
            endpoint: "http://localhost:8000".to_string(),
            model: "test-model".to_string(),
            num_runners: 2,
            num_tasks: 2,
            max_tokens: 16,
            seed: 42,
            prompts: vec!["hello".to_string()],
            signer: None,
            account_address: String::new(),
            api_key: None,
            no_sign: true,
            old_sign: false,
        };
        assert_eq!(config.num_tasks, 2);
    }
}
