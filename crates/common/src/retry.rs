//! Bounded exponential retry for calls to external HTTP collaborators

use crate::errors::{AppError, Result};
use backoff::{future::retry, ExponentialBackoffBuilder};
use reqwest::StatusCode;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

/// Run `attempt` until it succeeds, fails permanently, or `max_retries`
/// transient failures have been retried.
pub(crate) async fn with_retries<T, F, Fut>(
    operation: &'static str,
    max_retries: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, backoff::Error<AppError>>>,
{
    let attempts = AtomicU32::new(0);
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(250))
        .with_max_interval(Duration::from_secs(8))
        .with_max_elapsed_time(Some(Duration::from_secs(90)))
        .build();

    retry(policy, || {
        let number = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let call = attempt();
        async move {
            match call.await {
                Err(backoff::Error::Transient { err, .. }) if number > max_retries => {
                    Err(backoff::Error::permanent(err))
                }
                Err(backoff::Error::Transient { err, retry_after }) => {
                    warn!(
                        operation,
                        attempt = number,
                        max_retries,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    Err(backoff::Error::Transient { err, retry_after })
                }
                other => other,
            }
        }
    })
    .await
}

/// Rate limits and server errors are worth another attempt
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Wrap an error as transient or permanent according to the HTTP status
pub(crate) fn classify(status: StatusCode, err: AppError) -> backoff::Error<AppError> {
    if is_transient_status(status) {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}
