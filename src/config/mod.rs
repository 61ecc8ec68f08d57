//! Configuration for eventfold ingestion
//!
//! Controls backfill width, rate limiting, retry behaviour and the writer id
//! stamped into checkpoints. Every setting has a global value and can be
//! overridden per `(chain, provider kind)` pair.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use eventfold::EventfoldConfig;
//!
//! // 500 block ranges, no rate limit, unbounded retries
//! let config = EventfoldConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use eventfold::{EventfoldConfigBuilder, ProviderKind, RateLimit};
//! use alloy_chains::Chain;
//!
//! let config = EventfoldConfigBuilder::new()
//!     .max_block_range(2_000)
//!     .provider_rate_limit(Chain::base_mainnet(), ProviderKind::Alchemy, RateLimit::per_second(4))
//!     .writer_id("indexer-1")
//!     .build();
//! ```
//!
//! # Example: JSON
//!
//! ```rust
//! use eventfold::{EventfoldConfig, ProviderKind};
//! use alloy_chains::Chain;
//!
//! let config = EventfoldConfig::from_json_str(r#"{
//!     "maxBlockRange": 1000,
//!     "rateLimit": { "ratePerWindow": 10, "windowMillis": 1000 },
//!     "providers": [
//!         { "chainId": 8453, "provider": "alchemy", "maxBlockRange": 250 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.get_max_block_range(Chain::base_mainnet(), &ProviderKind::Alchemy).as_u64(), 250);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use alloy_chains::Chain;
use serde::Deserialize;

use crate::config_types::{MaxBlockRange, ProviderKind, RateLimit, RetryPolicy};

pub mod constants;

/// Configuration for eventfold operations
///
/// Use [`EventfoldConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct EventfoldConfig {
    /// Block range width for backfill queries
    /// Default: 500
    pub max_block_range: MaxBlockRange,

    /// Admission limit for source calls
    /// Default: None (unlimited)
    pub rate_limit: Option<RateLimit>,

    /// Backoff for transient source failures
    pub retry: RetryPolicy,

    /// Identity written into every checkpoint
    /// Default: `eventfold-<pid>`
    pub writer_id: String,

    /// Per `(chain, provider)` overrides
    pub provider_overrides: HashMap<(Chain, ProviderKind), ProviderConfig>,
}

/// Overrides for one `(chain, provider)` pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Override backfill width
    pub max_block_range: Option<MaxBlockRange>,

    /// Override admission limit
    pub rate_limit: Option<RateLimit>,
}

impl Default for EventfoldConfig {
    fn default() -> Self {
        Self {
            max_block_range: MaxBlockRange::DEFAULT,
            rate_limit: None,
            retry: RetryPolicy::default(),
            writer_id: format!("eventfold-{}", std::process::id()),
            provider_overrides: HashMap::new(),
        }
    }
}

impl EventfoldConfig {
    /// Effective backfill width for a chain and provider
    ///
    /// Returns the override if set, otherwise the global value.
    pub fn get_max_block_range(&self, chain: Chain, provider: &ProviderKind) -> MaxBlockRange {
        self.provider_overrides
            .get(&(chain, provider.clone()))
            .and_then(|c| c.max_block_range)
            .unwrap_or(self.max_block_range)
    }

    /// Effective rate limit for a chain and provider
    ///
    /// ```rust
    /// use eventfold::{EventfoldConfigBuilder, ProviderKind, RateLimit};
    /// use alloy_chains::Chain;
    ///
    /// let config = EventfoldConfigBuilder::new()
    ///     .rate_limit(RateLimit::per_second(10))
    ///     .provider_rate_limit(Chain::mainnet(), ProviderKind::Public, RateLimit::per_second(2))
    ///     .build();
    ///
    /// assert_eq!(
    ///     config.get_rate_limit(Chain::mainnet(), &ProviderKind::Public),
    ///     Some(RateLimit::per_second(2))
    /// );
    /// assert_eq!(
    ///     config.get_rate_limit(Chain::mainnet(), &ProviderKind::Infura),
    ///     Some(RateLimit::per_second(10))
    /// );
    /// ```
    pub fn get_rate_limit(&self, chain: Chain, provider: &ProviderKind) -> Option<RateLimit> {
        self.provider_overrides
            .get(&(chain, provider.clone()))
            .and_then(|c| c.rate_limit)
            .or(self.rate_limit)
    }

    /// Set an override for a chain and provider
    pub fn set_provider_override(
        &mut self,
        chain: Chain,
        provider: ProviderKind,
        config: ProviderConfig,
    ) {
        self.provider_overrides.insert((chain, provider), config);
    }

    /// Load configuration from a JSON document
    ///
    /// Unspecified fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mut builder = EventfoldConfigBuilder::new();

        if let Some(width) = raw.max_block_range {
            builder = builder.max_block_range(width);
        }
        if let Some(limit) = raw.rate_limit {
            builder = builder.rate_limit(limit);
        }
        if let Some(writer_id) = raw.writer_id {
            builder = builder.writer_id(writer_id);
        }
        if let Some(retry) = raw.retry {
            let defaults = RetryPolicy::default();
            builder = builder.retry(RetryPolicy {
                base_delay: retry
                    .base_delay_millis
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
                max_delay: retry
                    .max_delay_millis
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_delay),
                max_retries: retry.max_retries,
            });
        }
        for entry in raw.providers {
            builder = builder.provider_config(
                Chain::from_id(entry.chain_id),
                entry.provider,
                ProviderConfig {
                    max_block_range: entry.max_block_range.map(MaxBlockRange::new),
                    rate_limit: entry.rate_limit,
                },
            );
        }

        Ok(builder.build())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    max_block_range: Option<u64>,
    rate_limit: Option<RateLimit>,
    writer_id: Option<String>,
    retry: Option<RawRetry>,
    #[serde(default)]
    providers: Vec<RawProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRetry {
    base_delay_millis: Option<u64>,
    max_delay_millis: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProvider {
    chain_id: u64,
    provider: ProviderKind,
    max_block_range: Option<u64>,
    rate_limit: Option<RateLimit>,
}

/// Builder for [`EventfoldConfig`]
///
/// # Example
///
/// ```rust
/// use eventfold::{EventfoldConfigBuilder, RetryPolicy};
///
/// let config = EventfoldConfigBuilder::new()
///     .max_block_range(1000)
///     .retry(RetryPolicy::bounded(5))
///     .build();
/// assert_eq!(config.retry.max_retries, Some(5));
/// ```
#[derive(Debug, Default)]
pub struct EventfoldConfigBuilder {
    config: EventfoldConfig,
}

impl EventfoldConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set global backfill width
    pub fn max_block_range(mut self, max: u64) -> Self {
        self.config.max_block_range = MaxBlockRange::new(max);
        self
    }

    /// Set global rate limit
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.config.rate_limit = Some(limit);
        self
    }

    /// Set retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the writer id stamped into checkpoints
    pub fn writer_id(mut self, writer_id: impl Into<String>) -> Self {
        self.config.writer_id = writer_id.into();
        self
    }

    /// Replace the overrides for a chain and provider
    pub fn provider_config(
        mut self,
        chain: Chain,
        provider: ProviderKind,
        config: ProviderConfig,
    ) -> Self {
        self.config.set_provider_override(chain, provider, config);
        self
    }

    /// Set a rate limit for one chain and provider
    ///
    /// Leaves any other override for the pair in place.
    pub fn provider_rate_limit(
        mut self,
        chain: Chain,
        provider: ProviderKind,
        limit: RateLimit,
    ) -> Self {
        self.config
            .provider_overrides
            .entry((chain, provider))
            .or_default()
            .rate_limit = Some(limit);
        self
    }

    /// Set a backfill width for one chain and provider
    pub fn provider_block_range(mut self, chain: Chain, provider: ProviderKind, max: u64) -> Self {
        self.config
            .provider_overrides
            .entry((chain, provider))
            .or_default()
            .max_block_range = Some(MaxBlockRange::new(max));
        self
    }

    /// Build the configuration
    pub fn build(self) -> EventfoldConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventfoldConfig::default();
        assert_eq!(config.max_block_range, MaxBlockRange::DEFAULT);
        assert_eq!(config.get_rate_limit(Chain::mainnet(), &ProviderKind::Public), None);
        assert!(config.writer_id.starts_with("eventfold-"));
    }

    #[test]
    fn test_override_is_per_provider() {
        let config = EventfoldConfigBuilder::new()
            .provider_block_range(Chain::mainnet(), ProviderKind::Alchemy, 2_000)
            .build();

        assert_eq!(
            config.get_max_block_range(Chain::mainnet(), &ProviderKind::Alchemy),
            MaxBlockRange::new(2_000)
        );
        assert_eq!(
            config.get_max_block_range(Chain::mainnet(), &ProviderKind::Infura),
            MaxBlockRange::DEFAULT
        );
        assert_eq!(
            config.get_max_block_range(Chain::base_mainnet(), &ProviderKind::Alchemy),
            MaxBlockRange::DEFAULT
        );
    }

    #[test]
    fn test_rate_limit_and_range_overrides_compose() {
        let config = EventfoldConfigBuilder::new()
            .provider_block_range(Chain::mainnet(), ProviderKind::Public, 100)
            .provider_rate_limit(Chain::mainnet(), ProviderKind::Public, RateLimit::per_second(3))
            .build();

        let over = &config.provider_overrides[&(Chain::mainnet(), ProviderKind::Public)];
        assert_eq!(over.max_block_range, Some(MaxBlockRange::new(100)));
        assert_eq!(over.rate_limit, Some(RateLimit::per_second(3)));
    }

    #[test]
    fn test_from_json_full() {
        let config = EventfoldConfig::from_json_str(
            r#"{
                "maxBlockRange": 800,
                "writerId": "w1",
                "retry": { "baseDelayMillis": 50, "maxRetries": 4 },
                "providers": [
                    { "chainId": 1, "provider": "infura",
                      "rateLimit": { "ratePerWindow": 2, "windowMillis": 500 } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_block_range.as_u64(), 800);
        assert_eq!(config.writer_id, "w1");
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.retry.max_delay, RetryPolicy::default().max_delay);
        assert_eq!(config.retry.max_retries, Some(4));
        assert_eq!(
            config.get_rate_limit(Chain::mainnet(), &ProviderKind::Infura),
            Some(RateLimit::new(2, Duration::from_millis(500)))
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(EventfoldConfig::from_json_str("{\"maxBlockRange\": \"wide\"}").is_err());
    }
}
