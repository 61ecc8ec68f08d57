// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Durable store backends
//!
//! Checkpoints, aggregates, producer snapshots and tag reverse lookups all
//! live in one [`Store`], split into namespaces:
//!
//! - **Ordered namespaces** ([`OrderedStore`]) are keyed by block number and
//!   support nearest-at-or-below lookups.
//! - **Keyed namespaces** ([`KeyValueStore`]) are keyed by string.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral runs
//! - [`DiskStore`]: append-only JSON journals, one file per namespace
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventfold::store::{DiskStore, Store};
//!
//! let store = DiskStore::open("/var/lib/eventfold").await?;
//! let aggregates = store.ordered("aggregates/supply");
//! aggregates.put(10, serde_json::json!({"minted": "100"})).await?;
//!
//! // Block 15 has no entry; the nearest entry at or below it is returned
//! let (block, value) = aggregates.get(15, false).await?.unwrap();
//! assert_eq!(block, 10);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::errors::StoreError;

mod checkpoint;
mod disk;
mod memory;

pub use checkpoint::{Checkpoint, CheckpointLog, Cursor};
pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Numeric-keyed, ordered namespace
///
/// Each put is atomic per key. A put to an existing key replaces its value.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Store `value` at `key`
    async fn put(&self, key: u64, value: Value) -> Result<(), StoreError>;

    /// Value at `key` if `exact`, otherwise the entry with the highest key at
    /// or below `key`
    async fn get(&self, key: u64, exact: bool) -> Result<Option<(u64, Value)>, StoreError>;

    /// Entry with the highest key
    async fn newest(&self) -> Result<Option<(u64, Value)>, StoreError>;
}

/// String-keyed namespace
///
/// `put` replaces any existing value. Tag entries are only ever written once.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Whether `key` has a value
    async fn has(&self, key: &str) -> Result<bool, StoreError>;

    /// Store `value` at `key`
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Value at `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// A durable store made of named namespaces
///
/// Asking for the same namespace twice returns handles over the same data.
#[async_trait]
pub trait Store: Send + Sync {
    /// Ordered namespace `namespace`
    fn ordered(&self, namespace: &str) -> Arc<dyn OrderedStore>;

    /// Keyed namespace `namespace`
    fn keyed(&self, namespace: &str) -> Arc<dyn KeyValueStore>;

    /// Flush outstanding writes and reject further ones
    async fn close(&self) -> Result<(), StoreError>;
}

/// Typed view over an [`OrderedStore`]
///
/// Values are stored as JSON.
pub struct OrderedLog<T> {
    store: Arc<dyn OrderedStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for OrderedLog<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for OrderedLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedLog")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> OrderedLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Wrap an ordered namespace
    pub fn new(store: Arc<dyn OrderedStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Store `value` at `key`
    pub async fn put(&self, key: u64, value: &T) -> Result<(), StoreError> {
        self.store.put(key, serde_json::to_value(value)?).await
    }

    /// Value stored exactly at `key`
    pub async fn exact(&self, key: u64) -> Result<Option<T>, StoreError> {
        match self.store.get(key, true).await? {
            Some((_, value)) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Entry with the highest key at or below `key`
    pub async fn at_or_below(&self, key: u64) -> Result<Option<(u64, T)>, StoreError> {
        decode_entry(self.store.get(key, false).await?)
    }

    /// Entry with the highest key
    pub async fn newest(&self) -> Result<Option<(u64, T)>, StoreError> {
        decode_entry(self.store.newest().await?)
    }
}

fn decode_entry<T: DeserializeOwned>(
    entry: Option<(u64, Value)>,
) -> Result<Option<(u64, T)>, StoreError> {
    match entry {
        Some((key, value)) => Ok(Some((key, serde_json::from_value(value)?))),
        None => Ok(None),
    }
}
