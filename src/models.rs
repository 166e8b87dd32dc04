//! Core value types persisted to the embedded store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single inference request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Status::Success),
            "failed" => Ok(Status::Failed),
            other => Err(crate::error::Error::Protocol(format!(
                "unrecognized measurement status: {other}"
            ))),
        }
    }
}

/// A run of the benchmark: created once, never mutated.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: Option<i64>,
    pub experiment_name: String,
    pub experiment_date: DateTime<Utc>,
    pub description: Option<String>,
}

impl Experiment {
    pub fn new(experiment_name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: None,
            experiment_name: experiment_name.into(),
            experiment_date: Utc::now(),
            description,
        }
    }
}

/// A single key/value configuration fact about an experiment.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: Option<i64>,
    pub experiment_id: i64,
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(experiment_id: i64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            experiment_id,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The outcome of one request against the target endpoint.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub id: Option<i64>,
    pub experiment_id: i64,
    pub n_input: i64,
    pub n_output: i64,
    pub ttft: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub status: Status,
}

impl Measurement {
    /// Build a successful measurement. Panics are never used to enforce
    /// invariants here; callers (the inference runner) are expected to have
    /// already observed the conditions that make a stream a success.
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        experiment_id: i64,
        n_input: i64,
        n_output: i64,
        ttft: f64,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            id: None,
            experiment_id,
            n_input,
            n_output,
            ttft,
            start_time,
            end_time,
            status: Status::Success,
        }
    }

    /// Build a failed measurement from whatever timings/counts were captured
    /// before the failure occurred.
    pub fn failed(
        experiment_id: i64,
        n_input: i64,
        n_output: i64,
        ttft: f64,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            id: None,
            experiment_id,
            n_input,
            n_output,
            ttft,
            start_time,
            end_time,
            status: Status::Failed,
        }
    }

    pub fn latency(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The closed catalog of metric names the analyzer produces. Storage uses the
/// canonical string form; the read path parses unknown strings tolerantly
/// (falling back to `MetricName::Other`) so that `_window_<k>` suffixes and
/// any future metric names round-trip without becoming parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricName {
    Ttft,
    Ttft95,
    Top5Ttft,
    Latency,
    Latency95,
    Top5Latency,
    Tpot,
    Throughput,
    ThroughputInputTokens,
    ThroughputOutputTokens,
    Rps,
    LongerThan60Latency,
    LongerThan120Latency,
    LongerThan180Latency,
    FailedRequests,
    FailedRequestsPerHour,
    /// Any name not in the closed catalog above (including unknown strings
    /// read back from the store, e.g. from a newer writer version).
    Other(String),
}

impl MetricName {
    pub fn as_str(&self) -> &str {
        match self {
            MetricName::Ttft => "TTFT",
            MetricName::Ttft95 => "TTFT_95",
            MetricName::Top5Ttft => "TOP_5_TTFT",
            MetricName::Latency => "LATENCY",
            MetricName::Latency95 => "LATENCY_95",
            MetricName::Top5Latency => "TOP_5_LATENCY",
            MetricName::Tpot => "TPOT",
            MetricName::Throughput => "THROUGHPUT",
            MetricName::ThroughputInputTokens => "THROUGHPUT_INPUT_TOKENS",
            MetricName::ThroughputOutputTokens => "THROUGHPUT_OUTPUT_TOKENS",
            MetricName::Rps => "RPS",
            MetricName::LongerThan60Latency => "LONGER_THAN_60_LATENCY",
            MetricName::LongerThan120Latency => "LONGER_THAN_120_LATENCY",
            MetricName::LongerThan180Latency => "LONGER_THAN_180_LATENCY",
            MetricName::FailedRequests => "FAILED_REQUESTS",
            MetricName::FailedRequestsPerHour => "FAILED_REQUESTS_PER_HOUR",
            MetricName::Other(s) => s,
        }
    }

    /// Suffix this metric name for stress-mode window `k` (e.g. `TTFT_window_3`).
    pub fn windowed(&self, k: u64) -> String {
        format!("{}_window_{k}", self.as_str())
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "TTFT" => MetricName::Ttft,
            "TTFT_95" => MetricName::Ttft95,
            "TOP_5_TTFT" => MetricName::Top5Ttft,
            "LATENCY" => MetricName::Latency,
            "LATENCY_95" => MetricName::Latency95,
            "TOP_5_LATENCY" => MetricName::Top5Latency,
            "TPOT" => MetricName::Tpot,
            "THROUGHPUT" => MetricName::Throughput,
            "THROUGHPUT_INPUT_TOKENS" => MetricName::ThroughputInputTokens,
            "THROUGHPUT_OUTPUT_TOKENS" => MetricName::ThroughputOutputTokens,
            "RPS" => MetricName::Rps,
            "LONGER_THAN_60_LATENCY" => MetricName::LongerThan60Latency,
            "LONGER_THAN_120_LATENCY" => MetricName::LongerThan120Latency,
            "LONGER_THAN_180_LATENCY" => MetricName::LongerThan180Latency,
            "FAILED_REQUESTS" => MetricName::FailedRequests,
            "FAILED_REQUESTS_PER_HOUR" => MetricName::FailedRequestsPerHour,
            other => MetricName::Other(other.to_string()),
        }
    }
}

/// An aggregated indicator produced by the analyzer.
#[derive(Debug, Clone)]
pub struct Metric {
    pub id: Option<i64>,
    pub experiment_id: i64,
    pub metric_name: String,
    pub metric_value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(experiment_id: i64, metric_name: impl Into<String>, metric_value: f64) -> Self {
        Self {
            id: None,
            experiment_id,
            metric_name: metric_name.into(),
            metric_value,
            timestamp: Utc::now(),
        }
    }
}
