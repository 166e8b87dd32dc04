//! Retry-with-backoff helper for read-path store operations.
//!
//! Only the SQLite "busy"/"locked" condition is retried; any other error
//! propagates immediately. Writes never go through this path — the single
//! writer thread already eliminates the contention this exists to paper over.

use std::thread;
use std::time::Duration;

use rusqlite::ErrorCode;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_ATTEMPTS: u32 = 5;

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Run `f`, retrying up to [`MAX_ATTEMPTS`] times with exponential backoff
/// (100ms × 2^k) when it fails with a busy/locked error. Any other error, or
/// exhaustion of the retry budget, is returned to the caller.
pub fn with_retry<T>(mut f: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
    let mut attempt = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if is_lock_contention(&err) && attempt + 1 < MAX_ATTEMPTS => {
                let delay = BASE_DELAY * 2u32.pow(attempt);
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn busy_error() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            Some("database is locked".to_string()),
        )
    }

    #[test]
    fn succeeds_immediately_without_retry() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            Ok::<_, rusqlite::Error>(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_on_busy_then_succeeds() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy_error())
            } else {
                Ok(99)
            }
        });
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            Err::<i64, _>(busy_error())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), MAX_ATTEMPTS);
    }

    #[test]
    fn non_lock_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            Err::<i64, _>(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
