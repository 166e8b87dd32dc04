//! Reduces a set of measurements to the fixed metric catalog.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Measurement, MetricName, Status};

const LATENCY_THRESHOLDS: [(MetricName, f64); 3] = [
    (MetricName::LongerThan60Latency, 60.0),
    (MetricName::LongerThan120Latency, 120.0),
    (MetricName::LongerThan180Latency, 180.0),
];

/// The full catalog of computed indicators, keyed by [`MetricName::as_str`].
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    values: HashMap<String, f64>,
}

impl MetricSet {
    pub fn get(&self, name: &MetricName) -> Option<f64> {
        self.values.get(name.as_str()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn insert(&mut self, name: MetricName, value: f64) {
        self.values.insert(name.as_str().to_string(), value);
    }
}

/// Side-output alongside the metric catalog: input/output token statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputOutputStats {
    pub avg_n_input: f64,
    pub std_n_input: f64,
    pub avg_n_output: f64,
    pub std_n_output: f64,
}

/// Compute the full metric catalog for `measurements`. Returns
/// [`Error::EmptyExperiment`] if `measurements` is empty (the caller supplies
/// the experiment id purely for the error message).
pub fn compute_metrics(measurements: &[Measurement], experiment_id: i64) -> Result<MetricSet> {
    if measurements.is_empty() {
        return Err(Error::EmptyExperiment(experiment_id));
    }

    let mut set = MetricSet::default();
    let successes: Vec<&Measurement> = measurements
        .iter()
        .filter(|m| m.status == Status::Success)
        .collect();

    let mut ttfts: Vec<f64> = successes.iter().map(|m| m.ttft).collect();
    let mut latencies: Vec<f64> = successes.iter().map(|m| m.latency()).collect();
    ttfts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());

    set.insert(MetricName::Ttft, mean(&ttfts));
    set.insert(MetricName::Ttft95, percentile_95(&ttfts));
    set.insert(MetricName::Top5Ttft, top_5_pct_mean(&ttfts));

    set.insert(MetricName::Latency, mean(&latencies));
    set.insert(MetricName::Latency95, percentile_95(&latencies));
    set.insert(MetricName::Top5Latency, top_5_pct_mean(&latencies));

    let total_output: i64 = successes.iter().map(|m| m.n_output).sum();
    let total_input: i64 = successes.iter().map(|m| m.n_input).sum();
    let total_latency: f64 = successes.iter().map(|m| m.latency()).sum();

    set.insert(MetricName::Tpot, tpot(total_latency, total_output));

    let (min_start, max_end) = success_time_bounds(&successes);
    let window = max_end - min_start;

    set.insert(
        MetricName::Throughput,
        safe_div((total_input + total_output) as f64, window),
    );
    set.insert(
        MetricName::ThroughputInputTokens,
        safe_div(total_input as f64, window),
    );
    set.insert(
        MetricName::ThroughputOutputTokens,
        safe_div(total_output as f64, window),
    );
    set.insert(MetricName::Rps, safe_div(successes.len() as f64, window));

    for (name, threshold) in LATENCY_THRESHOLDS {
        let count = latencies.iter().filter(|&&l| l > threshold).count();
        set.insert(name, count as f64);
    }

    let failed_count = measurements
        .iter()
        .filter(|m| m.status == Status::Failed)
        .count();
    set.insert(MetricName::FailedRequests, failed_count as f64);

    let (all_min_start, all_max_end) = time_bounds(measurements);
    let all_window_hours = (all_max_end - all_min_start) / 3600.0;
    set.insert(
        MetricName::FailedRequestsPerHour,
        safe_div(failed_count as f64, all_window_hours),
    );

    Ok(set)
}

/// The four input/output token statistics written as parameters alongside
/// the metric catalog.
pub fn compute_input_output_stats(measurements: &[Measurement]) -> InputOutputStats {
    let successes: Vec<&Measurement> = measurements
        .iter()
        .filter(|m| m.status == Status::Success)
        .collect();
    let n_input: Vec<f64> = successes.iter().map(|m| m.n_input as f64).collect();
    let n_output: Vec<f64> = successes.iter().map(|m| m.n_output as f64).collect();

    InputOutputStats {
        avg_n_input: mean(&n_input),
        std_n_input: stdev(&n_input),
        avg_n_output: mean(&n_output),
        std_n_output: stdev(&n_output),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 divisor); 0.0 when fewer than 2 samples.
fn stdev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// 95th percentile via linear interpolation between order statistics.
/// `values` must already be sorted ascending.
fn percentile_95(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let idx = 0.95 * (n - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = lower + 1;
    if upper >= n {
        sorted[lower]
    } else {
        let frac = idx - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Mean of the top ~5% slice of a sorted (ascending) sample.
fn top_5_pct_mean(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    let cutoff = (0.95 * n as f64) as usize;
    if cutoff >= n {
        return 0.0;
    }
    mean(&sorted[cutoff..])
}

fn tpot(total_latency: f64, total_output: i64) -> f64 {
    if total_output == 0 {
        0.0
    } else {
        total_latency / total_output as f64
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        warn!("metric denominator is zero or negative; reporting 0.0");
        0.0
    } else {
        numerator / denominator
    }
}

fn success_time_bounds(successes: &[&Measurement]) -> (f64, f64) {
    if successes.is_empty() {
        return (0.0, 0.0);
    }
    let min_start = successes.iter().map(|m| m.start_time).fold(f64::INFINITY, f64::min);
    let max_end = successes
        .iter()
        .map(|m| m.end_time)
        .fold(f64::NEG_INFINITY, f64::max);
    (min_start, max_end)
}

fn time_bounds(measurements: &[Measurement]) -> (f64, f64) {
    if measurements.is_empty() {
        return (0.0, 0.0);
    }
    let min_start = measurements
        .iter()
        .map(|m| m.start_time)
        .fold(f64::INFINITY, f64::min);
    let max_end = measurements
        .iter()
        .map(|m| m.end_time)
        .fold(f64::NEG_INFINITY, f64::max);
    (min_start, max_end)
}
