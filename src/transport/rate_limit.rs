// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window rate limiting for chain log source calls.
//!
//! [`RateLimiter`] guarantees that at most `rate_per_window` calls *start*
//! within any trailing window. Callers are admitted strictly in submission
//! order. The same limiter can be put in front of an Alloy RPC client through
//! [`RateLimitLayer`].

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    sync::{Arc, PoisonError},
    task::{Context, Poll},
};

use alloy_chains::Chain;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower::Layer;
use tracing::trace;

use crate::config_types::{ProviderKind, RateLimit};

/// Admission control shared by every caller of one `(chain, provider)` pair
///
/// The limiter remembers the start time of recent executions. Before
/// admitting a task it discards starts older than the window; if fewer than
/// `rate_per_window` remain the task starts immediately, otherwise the caller
/// sleeps until the oldest start leaves the window.
///
/// Waiting callers queue on a fair mutex, so admission is FIFO. The task
/// itself runs outside that mutex and its result is handed back untouched.
///
/// # Example
///
/// ```rust,ignore
/// use eventfold::{RateLimit, RateLimiter};
///
/// let limiter = RateLimiter::new(RateLimit::per_second(10));
/// let head = limiter.execute(|| provider.get_block_number()).await?;
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    limit: Option<RateLimit>,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit.rate_per_window()` starts per window
    pub fn new(limit: RateLimit) -> Self {
        Self::from_limit(Some(limit))
    }

    /// Creates a limiter that admits everything immediately
    pub fn unlimited() -> Self {
        Self::from_limit(None)
    }

    /// Creates a limiter from an optional limit
    pub fn from_limit(limit: Option<RateLimit>) -> Self {
        let capacity = limit.map_or(0, |l| l.rate_per_window() as usize);
        Self {
            limit,
            starts: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// The configured limit
    pub fn limit(&self) -> Option<RateLimit> {
        self.limit
    }

    /// Waits for an admission slot and records the start
    pub async fn acquire(&self) {
        let Some(limit) = self.limit else {
            return;
        };

        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while starts
                .front()
                .is_some_and(|start| now.duration_since(*start) >= limit.window())
            {
                starts.pop_front();
            }

            if starts.len() < limit.rate_per_window() as usize {
                starts.push_back(now);
                return;
            }

            if let Some(oldest) = starts.front().copied() {
                let ready_at = oldest + limit.window();
                trace!(
                    wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                    "Rate limit reached, waiting for a slot"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    /// Runs `task` once admitted and returns its output
    ///
    /// Errors returned by the task reach the caller unchanged; they do not
    /// affect other queued tasks.
    pub async fn execute<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        task().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// One shared [`RateLimiter`] per `(chain, provider)` pair
///
/// The first request for a pair fixes its limit; later requests get the same
/// limiter regardless of the limit they pass.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: std::sync::Mutex<HashMap<(Chain, ProviderKind), Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiter for `chain` and `provider`, created with `limit` if absent
    pub fn get_or_create(
        &self,
        chain: Chain,
        provider: ProviderKind,
        limit: Option<RateLimit>,
    ) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry((chain, provider))
            .or_insert_with(|| Arc::new(RateLimiter::from_limit(limit)))
            .clone()
    }
}

/// A Tower layer that admits requests through a shared [`RateLimiter`].
///
/// # Example
///
/// ```rust,ignore
/// use eventfold::transport::RateLimitLayer;
/// use alloy_rpc_client::ClientBuilder;
///
/// let limiter = registry.get_or_create(chain, ProviderKind::Alchemy, Some(RateLimit::per_second(25)));
/// let client = ClientBuilder::default()
///     .layer(RateLimitLayer::new(limiter))
///     .http(rpc_url);
/// ```
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    /// Creates a layer over an existing limiter
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    /// Creates a layer with its own limiter
    pub fn per_window(limit: RateLimit) -> Self {
        Self::new(Arc::new(RateLimiter::new(limit)))
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            service,
            limiter: self.limiter.clone(),
        }
    }
}

/// A Tower service that waits for a [`RateLimiter`] slot before each call
#[derive(Clone, Debug)]
pub struct RateLimitService<S> {
    service: S,
    limiter: Arc<RateLimiter>,
}

impl<S, Request> tower::Service<Request> for RateLimitService<S>
where
    S: tower::Service<Request> + Clone + Send + 'static,
    S::Future: Send,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut service = self.service.clone();

        Box::pin(async move {
            limiter.acquire().await;
            service.call(request).await
        })
    }
}
