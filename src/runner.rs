//! Binds one logical worker to the HTTP client pool: sends one streaming
//! request, parses the SSE response, and produces one measurement.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use serde_json::json;
use tracing::{info_span, warn, Instrument};

use crate::error::{Error, Result};
use crate::http_pool::ClientPool;
use crate::models::Measurement;
use crate::signing::{headers_for, Signer};
use crate::sse::{Event, Parser};

/// Everything an inference runner needs that is shared across every worker.
/// Cheap to clone: the pool is shared via `Arc`, everything else is small
/// owned data, so each concurrently-dispatched task gets its own handle.
#[derive(Clone)]
pub struct InferenceRunner {
    pool: Arc<ClientPool>,
    endpoint: String,
    model: String,
    signer: Option<Signer>,
    account_address: String,
    api_key: Option<String>,
}

impl InferenceRunner {
    pub fn new(
        pool: Arc<ClientPool>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        signer: Option<Signer>,
        account_address: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            pool,
            endpoint: endpoint.into(),
            model: model.into(),
            signer,
            account_address: account_address.into(),
            api_key,
        }
    }

    /// Send one streaming chat-completion request and produce a measurement.
    /// Never returns `Err`: every failure path is folded into a failed
    /// [`Measurement`] so that one bad request never aborts an experiment.
    pub async fn run_inference(
        &self,
        experiment_id: i64,
        prompt: &str,
        max_tokens: u32,
        task_index: u64,
    ) -> Measurement {
        let span = info_span!("inference_request", experiment_id, task_index);
        self.run_inference_inner(experiment_id, prompt, max_tokens)
            .instrument(span)
            .await
    }

    async fn run_inference_inner(
        &self,
        experiment_id: i64,
        prompt: &str,
        max_tokens: u32,
    ) -> Measurement {
        let start = now_secs();
        let nonce: u32 = rand::random();

        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": true,
            "max_tokens": max_tokens,
            "temperature": 0.8,
            "stream_options": {"include_usage": true},
            "_nonce": nonce.to_string(),
        });
        let payload_bytes = match serde_json::to_vec(&body) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to serialize request payload");
                return Measurement::failed(experiment_id, 0, 0, 0.0, start, now_secs());
            }
        };

        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));
        let client = self.pool.get();
        let mut request = client.post(&url).header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        if let Some(headers) = headers_for(
            self.signer.as_ref(),
            &self.account_address,
            &payload_bytes,
            now_ns,
        ) {
            request = request
                .header("Authorization", headers.authorization)
                .header("X-Requester-Address", headers.requester_address)
                .header("X-Timestamp", headers.timestamp_ns.to_string());
        }

        let response = match request.body(payload_bytes).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "transport error sending inference request");
                return Measurement::failed(experiment_id, 0, 0, 0.0, start, now_secs());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body_text).unwrap_or(body_text);
            warn!(status = %status, message = %message, "inference request returned an error status");
            return Measurement::failed(experiment_id, 0, 0, 0.0, start, now_secs());
        }

        self.consume_stream(response, start, experiment_id).await
    }

    async fn consume_stream(
        &self,
        response: reqwest::Response,
        start: f64,
        experiment_id: i64,
    ) -> Measurement {
        let mut byte_stream = response.bytes_stream();
        let mut parser = Parser::new();
        let mut buffer = String::new();

        let mut ttft: Option<f64> = None;
        let mut n_input: i64 = 0;
        let mut n_output: i64 = 0;
        let mut n_chunks: u64 = 0;
        let mut saw_empty_first_content = false;
        let mut saw_usage = false;

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(err) => {
                    warn!(error = %err, "transport error mid-stream");
                    return Measurement::failed(
                        experiment_id,
                        n_input,
                        n_output,
                        ttft.unwrap_or(0.0),
                        start,
                        now_secs(),
                    );
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer.drain(..=pos);

                match parser.feed_line(&line) {
                    Event::Content(text) => {
                        n_chunks += 1;
                        if ttft.is_none() {
                            if text.is_empty() {
                                if saw_empty_first_content {
                                    warn!("second consecutive empty first-token chunk; treating as malformed stream");
                                    return Measurement::failed(
                                        experiment_id,
                                        n_input,
                                        n_output,
                                        0.0,
                                        start,
                                        now_secs(),
                                    );
                                }
                                saw_empty_first_content = true;
                                continue;
                            }
                            ttft = Some(now_secs() - start);
                        }
                    }
                    Event::Usage {
                        n_input: input,
                        n_output: output,
                    } => {
                        n_input = input;
                        n_output = output;
                        saw_usage = true;
                    }
                    Event::Done => {
                        let end = now_secs();
                        return self.finish(
                            experiment_id,
                            n_chunks,
                            saw_usage,
                            ttft,
                            n_input,
                            n_output,
                            start,
                            end,
                        );
                    }
                    Event::Skip => {}
                }
            }
        }

        // Stream ended without an explicit [DONE] terminator.
        warn!("SSE stream ended before a [DONE] terminator was observed");
        self.finish(
            experiment_id,
            n_chunks,
            saw_usage,
            ttft,
            n_input,
            n_output,
            start,
            now_secs(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        experiment_id: i64,
        n_chunks: u64,
        saw_usage: bool,
        ttft: Option<f64>,
        n_input: i64,
        n_output: i64,
        start: f64,
        end: f64,
    ) -> Measurement {
        if n_chunks == 0 {
            warn!("stream produced no content chunks");
            return Measurement::failed(experiment_id, n_input, n_output, ttft.unwrap_or(0.0), start, end);
        }
        if !saw_usage {
            warn!("stream completed without a usage payload");
            return Measurement::failed(experiment_id, n_input, n_output, ttft.unwrap_or(0.0), start, end);
        }
        Measurement::success(experiment_id, n_input, n_output, ttft.unwrap_or(0.0), start, end)
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str().map(str::to_string))
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Returned by callers that need to surface a fatal setup-time error
/// (missing endpoint, invalid signing material) rather than a per-request
/// failure.
pub fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Config(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
