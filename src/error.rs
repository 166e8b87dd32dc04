//! Error taxonomy for the benchmarking engine.

use thiserror::Error;

/// Errors surfaced by the core engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal configuration problem, raised at setup time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection reset, read timeout, DNS failure, etc. Callers convert this
    /// into a failed [`crate::models::Measurement`] rather than aborting the run.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// HTTP 4xx/5xx, malformed SSE terminator, missing usage payload, or a
    /// stream that produced no content chunks.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Embedded store read or write failure.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// secp256k1 key or signature construction failure.
    #[error("signing error: {0}")]
    Signing(String),

    /// The analyzer was asked to summarize an experiment with zero measurements.
    #[error("no measurements found for experiment {0}")]
    EmptyExperiment(i64),

    /// YAML (de)serialization of a [`crate::config::RunConfig`] failed.
    #[error("config (de)serialization error: {0}")]
    ConfigSerde(#[from] serde_yml::Error),

    /// A blocking store operation's `spawn_blocking` task panicked or was
    /// cancelled before it could return.
    #[error("background store task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("missing endpoint".to_string());
        assert_eq!(err.to_string(), "configuration error: missing endpoint");
    }

    #[test]
    fn protocol_error_display() {
        let err = Error::Protocol("missing usage".to_string());
        assert_eq!(err.to_string(), "protocol error: missing usage");
    }

    #[test]
    fn empty_experiment_display() {
        let err = Error::EmptyExperiment(42);
        assert_eq!(err.to_string(), "no measurements found for experiment 42");
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }

    #[test]
    fn store_error_from_rusqlite() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: Error = sqlite_err.into();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn blocking_error_from_join_error() {
        let handle = tokio::task::spawn_blocking(|| panic!("boom"));
        let join_err = handle.await.unwrap_err();
        let err: Error = join_err.into();
        assert!(matches!(err, Error::Blocking(_)));
    }
}
