//! Strong types for configuration values
//!
//! These types keep batch widths, rate limits and retry budgets from being
//! confused with chain values such as block numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Width of one backfill query, in blocks
///
/// Providers refuse `eth_getLogs` ranges above a provider-specific width, so
/// backfill splits its work into ranges of at most this many blocks.
///
/// # Examples
///
/// ```
/// use eventfold::MaxBlockRange;
///
/// let range = MaxBlockRange::new(1000);
/// let chunks: Vec<_> = range.chunk_range(0, 2500).collect();
/// assert_eq!(chunks, vec![(0, 999), (1000, 1999), (2000, 2500)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaxBlockRange(u64);

impl MaxBlockRange {
    /// Safe for public endpoints and most hosted providers
    pub const DEFAULT: Self = Self(500);

    /// For providers that serve wide log ranges
    pub const GENEROUS: Self = Self(10_000);

    /// Create a new max block range
    ///
    /// A width of zero is treated as one block.
    pub const fn new(blocks: u64) -> Self {
        if blocks == 0 {
            Self(1)
        } else {
            Self(blocks)
        }
    }

    /// Get the inner u64 value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Last block of the range starting at `start`, clamped to `head`
    ///
    /// ```
    /// use eventfold::MaxBlockRange;
    ///
    /// let range = MaxBlockRange::new(100);
    /// assert_eq!(range.range_end(0, 1_000), 99);
    /// assert_eq!(range.range_end(950, 1_000), 1_000);
    /// ```
    pub fn range_end(&self, start: u64, head: u64) -> u64 {
        start.saturating_add(self.0 - 1).min(head)
    }

    /// Calculate number of chunks needed to cover `[start, end]`
    pub fn chunks_needed(&self, start: u64, end: u64) -> usize {
        if end < start {
            return 0;
        }
        let total_blocks = end - start + 1;
        total_blocks.div_ceil(self.0) as usize
    }

    /// Split `[start, end]` into chunks of at most `self` blocks
    pub fn chunk_range(&self, start: u64, end: u64) -> ChunkIterator {
        ChunkIterator {
            next: Some(start).filter(|s| *s <= end),
            end,
            width: *self,
        }
    }
}

impl Default for MaxBlockRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u64> for MaxBlockRange {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for MaxBlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocks", self.0)
    }
}

/// Iterator over `(start, end)` block chunks, created by
/// [`MaxBlockRange::chunk_range`]
#[derive(Debug, Clone)]
pub struct ChunkIterator {
    next: Option<u64>,
    end: u64,
    width: MaxBlockRange,
}

impl Iterator for ChunkIterator {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next?;
        let end = self.width.range_end(start, self.end);
        self.next = end.checked_add(1).filter(|n| *n <= self.end);
        Some((start, end))
    }
}

/// Sliding-window admission limit: at most `rate_per_window` starts within
/// any trailing `window`
///
/// Serialized as `{ "ratePerWindow": 10, "windowMillis": 1000 }`.
///
/// # Examples
///
/// ```
/// use eventfold::RateLimit;
/// use std::time::Duration;
///
/// let limit = RateLimit::per_second(25);
/// assert_eq!(limit.window(), Duration::from_secs(1));
///
/// let parsed: RateLimit =
///     serde_json::from_str(r#"{"ratePerWindow":5,"windowMillis":250}"#).unwrap();
/// assert_eq!(parsed, RateLimit::new(5, Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RateLimitRepr", into = "RateLimitRepr")]
pub struct RateLimit {
    rate_per_window: u32,
    window: Duration,
}

impl RateLimit {
    /// Create a limit of `rate_per_window` starts per `window`
    ///
    /// A rate of zero is treated as one.
    pub fn new(rate_per_window: u32, window: Duration) -> Self {
        Self {
            rate_per_window: rate_per_window.max(1),
            window,
        }
    }

    /// Create a limit of `requests` starts per second
    pub fn per_second(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(1))
    }

    /// Maximum starts per window, never zero
    pub fn rate_per_window(&self) -> u32 {
        self.rate_per_window
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitRepr {
    rate_per_window: u32,
    window_millis: u64,
}

impl From<RateLimitRepr> for RateLimit {
    fn from(repr: RateLimitRepr) -> Self {
        RateLimit::new(repr.rate_per_window, Duration::from_millis(repr.window_millis))
    }
}

impl From<RateLimit> for RateLimitRepr {
    fn from(limit: RateLimit) -> Self {
        RateLimitRepr {
            rate_per_window: limit.rate_per_window,
            window_millis: limit.window.as_millis() as u64,
        }
    }
}

/// Exponential backoff policy for transient source failures
///
/// The delay before retry `n` (zero-based) is
///
/// ```text
/// delay = min(base_delay * 2^n, max_delay)
/// ```
///
/// `max_retries = None` retries forever, which is what a long-running indexer
/// usually wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Retries after the first attempt, `None` for unbounded
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after `max_retries` retries
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (zero-based)
    ///
    /// ```
    /// use eventfold::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy {
    ///     base_delay: Duration::from_millis(100),
    ///     max_delay: Duration::from_millis(500),
    ///     max_retries: None,
    /// };
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for(3), Duration::from_millis(500));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2u128.saturating_pow(attempt);
        let delay_ms = self.base_delay.as_millis().saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis()) as u64)
    }

    /// Whether another retry is allowed after `retries` retries
    pub fn allows(&self, retries: u32) -> bool {
        self.max_retries.is_none_or(|max| retries < max)
    }
}

/// Kind of RPC provider behind a chain endpoint
///
/// Rate limits and batch widths are configured per `(chain, provider kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Public, unauthenticated endpoint
    Public,
    /// Alchemy
    Alchemy,
    /// Infura
    Infura,
    /// QuickNode
    QuickNode,
    /// Anything else, by name
    Custom(String),
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Public => f.write_str("public"),
            ProviderKind::Alchemy => f.write_str("alchemy"),
            ProviderKind::Infura => f.write_str("infura"),
            ProviderKind::QuickNode => f.write_str("quicknode"),
            ProviderKind::Custom(name) => f.write_str(name),
        }
    }
}
