// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for eventfold integration tests
//!
//! Provides mock implementations of the source and store traits so indexers
//! and connectors can run without a chain.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy_chains::Chain;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{address, Address, U256};
use async_trait::async_trait;
use eventfold::source::{LogSource, SourceEvent, SourceEventStream};
use eventfold::store::{KeyValueStore, MemoryStore, OrderedStore, Store};
use eventfold::{
    ChainArtifact, ConnectorError, EventSink, IndexedEvent, RpcError, StoreError, Subscription,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub const TOKEN: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
pub const ALICE: Address = address!("1111111111111111111111111111111111111111");
pub const BOB: Address = address!("2222222222222222222222222222222222222222");

/// Installs a test-writer subscriber filtered by `RUST_LOG`
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The ERC-20 under test on mainnet
pub fn token() -> ChainArtifact {
    ChainArtifact::erc20(Chain::mainnet(), TOKEN)
}

/// Decoded `Transfer(from, to, value)` as a source would deliver it
pub fn transfer(block: u64, log_index: u64, from: Address, to: Address, value: u64) -> SourceEvent {
    SourceEvent {
        block_number: Some(block),
        log_index: Some(log_index),
        transaction_hash: None,
        removed: false,
        args: vec![
            DynSolValue::Address(from),
            DynSolValue::Address(to),
            DynSolValue::Uint(U256::from(value), 256),
        ],
    }
}

/// In-memory chain with controllable head, failures and live delivery
///
/// # Example
///
/// ```rust,ignore
/// let source = MockLogSource::new(100)
///     .with_events(vec![transfer(10, 0, Address::ZERO, ALICE, 100)]);
/// source.fail_next_queries(2);
/// ```
#[derive(Default)]
pub struct MockLogSource {
    events: Mutex<Vec<SourceEvent>>,
    head: AtomicU64,
    query_failures: AtomicU32,
    queries: Mutex<Vec<(u64, u64)>>,
    subscriptions: AtomicU32,
    live: Mutex<Option<mpsc::UnboundedSender<SourceEvent>>>,
}

impl MockLogSource {
    /// A chain at block `head` with no events
    pub fn new(head: u64) -> Self {
        let source = Self::default();
        source.head.store(head, Ordering::SeqCst);
        source
    }

    /// Adds historical events
    pub fn with_events(self, events: Vec<SourceEvent>) -> Self {
        self.push_events(events);
        self
    }

    /// Adds events visible to later range queries
    pub fn push_events(&self, events: Vec<SourceEvent>) {
        self.events.lock().unwrap().extend(events);
    }

    /// Moves the head
    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Makes the next `n` range queries fail with a transient error
    pub fn fail_next_queries(&self, n: u32) {
        self.query_failures.store(n, Ordering::SeqCst);
    }

    /// Every `(from, to)` range queried so far
    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of `subscribe` calls
    pub fn subscriptions(&self) -> u32 {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Pushes an event to the current live subscriber
    pub fn push_live(&self, event: SourceEvent) -> bool {
        self.live
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Ends the current live stream
    pub fn end_live(&self) {
        self.live.lock().unwrap().take();
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn query(
        &self,
        _subscription: &Subscription,
        from: u64,
        to: u64,
    ) -> Result<Vec<SourceEvent>, RpcError> {
        self.queries.lock().unwrap().push((from, to));

        let remaining = self.query_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.query_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RpcError::get_logs_failed(
                format!("{from}-{to}"),
                std::io::Error::other("429 Too Many Requests"),
            ));
        }

        let mut events: Vec<SourceEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.block_number.is_none_or(|b| (from..=to).contains(&b)))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn subscribe(&self, _subscription: &Subscription) -> Result<SourceEventStream, RpcError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.live.lock().unwrap() = Some(tx);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn head(&self) -> Result<u64, RpcError> {
        Ok(self.head.load(Ordering::SeqCst))
    }
}

/// Sink that records what an indexer delivers
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<IndexedEvent>>,
    pub blocks: Mutex<Vec<u64>>,
}

impl RecordingSink {
    /// `(block, log_index)` of every delivered event
    pub fn positions(&self) -> Vec<(u64, u64)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.block_number, e.log_index))
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn on_event(&self, event: &IndexedEvent) -> Result<(), ConnectorError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn on_block(&self, block: u64) -> Result<(), ConnectorError> {
        self.blocks.lock().unwrap().push(block);
        Ok(())
    }
}

/// Store wrapper that counts ordered writes and can simulate a crash
///
/// After the write budget set by [`crash_after`](Self::crash_after) is spent,
/// every write fails and leaves the data untouched.
#[derive(Clone)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    budget: Arc<AtomicI64>,
    ordered_puts: Arc<Mutex<HashMap<(String, u64), usize>>>,
    keyed_puts: Arc<Mutex<HashMap<(String, String), usize>>>,
}

impl InstrumentedStore {
    /// Wraps `inner`; writes are unlimited
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            budget: Arc::new(AtomicI64::new(-1)),
            ordered_puts: Arc::new(Mutex::new(HashMap::new())),
            keyed_puts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lets `writes` more writes succeed, then fails the rest
    pub fn crash_after(&self, writes: usize) {
        self.budget.store(writes as i64, Ordering::SeqCst);
    }

    /// Lifts any write budget
    pub fn recover(&self) {
        self.budget.store(-1, Ordering::SeqCst);
    }

    /// How often `key` was written in ordered namespace `namespace`
    pub fn put_count(&self, namespace: &str, key: u64) -> usize {
        self.ordered_puts
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key))
            .copied()
            .unwrap_or(0)
    }

    /// Every `(key, writes)` of ordered namespace `namespace`
    pub fn put_counts(&self, namespace: &str) -> Vec<(u64, usize)> {
        let mut counts: Vec<(u64, usize)> = self
            .ordered_puts
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((_, key), count)| (*key, *count))
            .collect();
        counts.sort_unstable();
        counts
    }

    /// How often `key` was written in keyed namespace `namespace`
    pub fn keyed_put_count(&self, namespace: &str, key: &str) -> usize {
        self.keyed_puts
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn spend(budget: &AtomicI64) -> Result<(), StoreError> {
        let left = budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::io(
                "instrumented",
                std::io::Error::other("simulated crash"),
            ));
        }
        if left > 0 {
            budget.store(left - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct InstrumentedOrdered {
    namespace: String,
    inner: Arc<dyn OrderedStore>,
    budget: Arc<AtomicI64>,
    puts: Arc<Mutex<HashMap<(String, u64), usize>>>,
}

#[async_trait]
impl OrderedStore for InstrumentedOrdered {
    async fn put(&self, key: u64, value: Value) -> Result<(), StoreError> {
        InstrumentedStore::spend(&self.budget)?;
        self.inner.put(key, value).await?;
        *self
            .puts
            .lock()
            .unwrap()
            .entry((self.namespace.clone(), key))
            .or_default() += 1;
        Ok(())
    }

    async fn get(&self, key: u64, exact: bool) -> Result<Option<(u64, Value)>, StoreError> {
        self.inner.get(key, exact).await
    }

    async fn newest(&self) -> Result<Option<(u64, Value)>, StoreError> {
        self.inner.newest().await
    }
}

struct InstrumentedKeyed {
    namespace: String,
    inner: Arc<dyn KeyValueStore>,
    budget: Arc<AtomicI64>,
    puts: Arc<Mutex<HashMap<(String, String), usize>>>,
}

#[async_trait]
impl KeyValueStore for InstrumentedKeyed {
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.has(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        InstrumentedStore::spend(&self.budget)?;
        self.inner.put(key, value).await?;
        *self
            .puts
            .lock()
            .unwrap()
            .entry((self.namespace.clone(), key.to_string()))
            .or_default() += 1;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }
}

#[async_trait]
impl Store for InstrumentedStore {
    fn ordered(&self, namespace: &str) -> Arc<dyn OrderedStore> {
        Arc::new(InstrumentedOrdered {
            namespace: namespace.to_string(),
            inner: self.inner.ordered(namespace),
            budget: Arc::clone(&self.budget),
            puts: Arc::clone(&self.ordered_puts),
        })
    }

    fn keyed(&self, namespace: &str) -> Arc<dyn KeyValueStore> {
        Arc::new(InstrumentedKeyed {
            namespace: namespace.to_string(),
            inner: self.inner.keyed(namespace),
            budget: Arc::clone(&self.budget),
            puts: Arc::clone(&self.keyed_puts),
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}
