//! Iterative retry loop.
//!
//! # Responsibilities
//! - Run an attempt, sleep according to a [`Backoff`], try again
//! - Stop after `max_attempts` and hand back the last failure
//! - Abort deterministically when the cancellation token fires

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::resilience::backoff::Backoff;

/// Why a retried operation did not produce a value.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The cancellation token fired before an attempt succeeded.
    #[error("retry loop cancelled")]
    Cancelled,
}

/// Run `op` until it succeeds, at most `max_attempts` times.
///
/// The first attempt runs immediately; attempt `n + 1` runs after
/// `backoff.delay(n - 1)`. The closure receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    backoff: &Backoff,
    max_attempts: u32,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = backoff.delay(attempt - 1);
        tracing::debug!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, backing off"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
