//! Concurrent load generator and performance analyzer for streaming,
//! OpenAI-compatible chat-completion endpoints.
//!
//! The core pieces: a request driver with a tolerant SSE parser ([`sse`],
//! [`runner`]), bounded and continuous dispatch modes ([`experiment`],
//! [`stress`]), a metrics analyzer ([`analyzer`]) over a fixed catalog
//! ([`models::MetricName`]), and a serialized single-writer persistence
//! pipeline ([`write_queue`], [`store`]) onto an embedded SQLite store.
//! Request signing ([`signing`]) is optional and off by default.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod experiment;
pub mod http_pool;
pub mod models;
pub mod prompt;
pub mod runner;
pub mod signing;
pub mod sse;
pub mod store;
pub mod stress;
pub mod tracing_init;
pub mod write_queue;

pub use error::{Error, Result};
