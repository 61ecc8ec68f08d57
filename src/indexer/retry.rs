// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Rate-limited source calls with exponential backoff

use std::future::Future;

use tracing::{error, warn};

use crate::config_types::RetryPolicy;
use crate::errors::{IndexerError, RpcError};
use crate::transport::RateLimiter;

/// Runs `call` through `limiter`, retrying transient failures per `policy`
///
/// Every attempt, retries included, takes its own admission slot. Errors that
/// retrying cannot fix end the loop at once.
pub(crate) async fn with_retry<T, F, Fut>(
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, IndexerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut retries = 0u32;
    loop {
        match limiter.execute(&mut call).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && policy.allows(retries) => {
                let delay = policy.delay_for(retries);
                warn!(
                    operation = operation,
                    attempt = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Source call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => {
                error!(
                    operation = operation,
                    attempts = retries + 1,
                    error = %e,
                    "Source call failed, giving up"
                );
                return Err(IndexerError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: retries + 1,
                    source: e,
                });
            }
        }
    }
}
