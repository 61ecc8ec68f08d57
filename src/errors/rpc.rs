//! Shared RPC error types for chain log source operations.
//!
//! The indexer retries transient errors with backoff and never advances its
//! checkpoint past the range that failed. [`RpcError::InvalidRequest`] is the
//! exception: retrying cannot fix it, so the first attempt is the last. See
//! [`RpcError::is_transient`].

/// Errors that can occur while talking to a chain log source.
///
/// # Examples
///
/// ```rust
/// use eventfold::RpcError;
///
/// let error = RpcError::get_logs_failed(
///     "Transfer 100-199",
///     std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
/// );
/// assert!(error.to_string().contains("Transfer 100-199"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Failed to fetch logs for a block range.
    ///
    /// This can occur due to rate limiting, ranges the provider refuses to
    /// serve, network connectivity issues, or provider-side errors.
    #[error("Failed to fetch logs for {operation}")]
    GetLogsFailed {
        /// Description of the operation that failed (e.g., "Transfer 100-200")
        operation: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to fetch the current chain head.
    #[error("Failed to get current block number")]
    GetBlockNumberFailed {
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to establish a live subscription.
    #[error("Failed to subscribe to {subscription_type}")]
    SubscriptionFailed {
        /// What was being subscribed to (e.g., "logs")
        subscription_type: String,
        /// The underlying provider error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request could not be built for this source.
    ///
    /// Raised when a subscription names an event the source has no ABI for,
    /// or an artifact that carries no contract address.
    #[error("Invalid request: {details}")]
    InvalidRequest {
        /// What was wrong with the request
        details: String,
    },
}

impl RpcError {
    /// Helper to create a `GetLogsFailed` error from any error type.
    pub fn get_logs_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::GetLogsFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Helper to create a `GetBlockNumberFailed` error from any error type.
    pub fn get_block_number_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        RpcError::GetBlockNumberFailed {
            source: Box::new(source),
        }
    }

    /// Helper to create a `SubscriptionFailed` error from any error type.
    pub fn subscription_failed(
        subscription_type: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RpcError::SubscriptionFailed {
            subscription_type: subscription_type.into(),
            source: Box::new(source),
        }
    }

    /// Create an `InvalidRequest` error with details.
    pub fn invalid_request(details: impl Into<String>) -> Self {
        RpcError::InvalidRequest {
            details: details.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// A malformed request fails the same way every time.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RpcError::InvalidRequest { .. })
    }
}
