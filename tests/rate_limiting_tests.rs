// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for rate limiting
//!
//! These tests validate admission timing of the sliding-window limiter and
//! that configured limits reach the limiters indexers share.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_chains::Chain;
use eventfold::store::MemoryStore;
use eventfold::{
    EventfoldConfig, EventfoldConfigBuilder, ProviderKind, RateLimit, RateLimiter, Registry,
    RpcError,
};
use futures::future::join_all;
use tokio::time::Instant;

/// Test that the K-th of many queued tasks waits for its window
#[tokio::test(start_paused = true)]
async fn test_kth_task_starts_after_full_windows() {
    let limiter = Arc::new(RateLimiter::new(RateLimit::new(3, Duration::from_millis(300))));
    let origin = Instant::now();
    let starts = Arc::new(Mutex::new(Vec::new()));

    let tasks = (0..10).map(|k| {
        let limiter = Arc::clone(&limiter);
        let starts = Arc::clone(&starts);
        async move {
            limiter
                .execute(|| async {
                    starts.lock().unwrap().push((k, origin.elapsed()));
                })
                .await;
        }
    });
    join_all(tasks).await;

    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 10);
    for (position, (_, elapsed)) in starts.iter().enumerate() {
        let full_windows = (position / 3) as u32;
        assert!(
            *elapsed >= Duration::from_millis(300) * full_windows,
            "task {position} started at {elapsed:?}"
        );
    }
}

/// Test that submission order is admission order
#[tokio::test(start_paused = true)]
async fn test_admission_is_fifo() {
    let limiter = Arc::new(RateLimiter::new(RateLimit::new(1, Duration::from_millis(50))));
    let order = Arc::new(Mutex::new(Vec::new()));

    let tasks = (0..6).map(|k| {
        let limiter = Arc::clone(&limiter);
        let order = Arc::clone(&order);
        async move {
            limiter
                .execute(|| async {
                    order.lock().unwrap().push(k);
                })
                .await;
        }
    });
    join_all(tasks).await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
}

/// Test that a failing task hands its error back and does not stall the rest
#[tokio::test(start_paused = true)]
async fn test_failed_task_does_not_block_queue() {
    let limiter = RateLimiter::new(RateLimit::new(2, Duration::from_millis(100)));

    let first: Result<u64, RpcError> = limiter
        .execute(|| async { Err(RpcError::invalid_request("bad filter")) })
        .await;
    let second: Result<u64, RpcError> = limiter.execute(|| async { Ok(7) }).await;

    assert!(matches!(first, Err(RpcError::InvalidRequest { .. })));
    assert_eq!(second.unwrap(), 7);
}

/// Test that a configured rate of zero still admits one start per window
#[tokio::test(start_paused = true)]
async fn test_zero_rate_admits_one_per_window() {
    let limit: RateLimit =
        serde_json::from_str(r#"{"ratePerWindow":0,"windowMillis":200}"#).unwrap();
    assert_eq!(limit.rate_per_window(), 1);

    let limiter = RateLimiter::new(limit);
    let start = Instant::now();

    tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
        .await
        .expect("first start is admitted immediately");
    assert_eq!(start.elapsed(), Duration::ZERO);

    tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
        .await
        .expect("second start waits one window");
    assert_eq!(start.elapsed(), Duration::from_millis(200));
}

/// Test that an unlimited limiter never waits
#[tokio::test(start_paused = true)]
async fn test_unlimited_never_waits() {
    let limiter = RateLimiter::unlimited();
    let start = Instant::now();

    for _ in 0..1_000 {
        limiter.execute(|| async {}).await;
    }

    assert_eq!(start.elapsed(), Duration::ZERO);
}

/// Test that provider overrides reach the registry's shared limiters
#[test]
fn test_registry_limiters_follow_config() {
    let config = EventfoldConfigBuilder::new()
        .rate_limit(RateLimit::per_second(10))
        .provider_rate_limit(Chain::base_mainnet(), ProviderKind::Alchemy, RateLimit::per_second(4))
        .build();
    let registry = Registry::open(config, Arc::new(MemoryStore::new()));

    assert_eq!(
        registry
            .rate_limiter(Chain::base_mainnet(), &ProviderKind::Alchemy)
            .limit(),
        Some(RateLimit::per_second(4))
    );
    assert_eq!(
        registry
            .rate_limiter(Chain::base_mainnet(), &ProviderKind::Public)
            .limit(),
        Some(RateLimit::per_second(10))
    );
}

/// Test that default configuration does not throttle
#[test]
fn test_default_config_is_unlimited() {
    let registry = Registry::open(EventfoldConfig::default(), Arc::new(MemoryStore::new()));

    assert_eq!(
        registry
            .rate_limiter(Chain::mainnet(), &ProviderKind::Public)
            .limit(),
        None
    );
}

/// Test that JSON configuration uses the documented key names
#[test]
fn test_json_rate_limit_config() {
    let config = EventfoldConfig::from_json_str(
        r#"{
            "rateLimit": { "ratePerWindow": 5, "windowMillis": 1000 },
            "providers": [
                { "chainId": 8453, "provider": "alchemy", "rateLimit": { "ratePerWindow": 2, "windowMillis": 500 } }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(
        config.get_rate_limit(Chain::mainnet(), &ProviderKind::Public),
        Some(RateLimit::new(5, Duration::from_secs(1)))
    );
    assert_eq!(
        config.get_rate_limit(Chain::base_mainnet(), &ProviderKind::Alchemy),
        Some(RateLimit::new(2, Duration::from_millis(500)))
    );
}
