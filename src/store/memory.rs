// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory store

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{KeyValueStore, OrderedStore, Store};
use crate::errors::StoreError;

/// Process-local [`Store`]
///
/// Clones share the same data, so a test can keep one handle for assertions
/// while the code under test owns another.
///
/// # Examples
///
/// ```rust
/// use eventfold::store::{MemoryStore, Store};
///
/// # tokio_test_block_on(async {
/// let store = MemoryStore::new();
/// let tags = store.keyed("tags");
/// tags.put("a", "b".to_string()).await.unwrap();
/// assert!(store.keyed("tags").has("a").await.unwrap());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<std::sync::Mutex<Namespaces>>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Namespaces {
    ordered: HashMap<String, Arc<MemoryOrdered>>,
    keyed: HashMap<String, Arc<MemoryKeyed>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn ordered(&self, namespace: &str) -> Arc<dyn OrderedStore> {
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces
            .ordered
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryOrdered {
                    entries: Mutex::default(),
                    closed: self.closed.clone(),
                })
            })
            .clone()
    }

    fn keyed(&self, namespace: &str) -> Arc<dyn KeyValueStore> {
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces
            .keyed
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryKeyed {
                    entries: Mutex::default(),
                    closed: self.closed.clone(),
                })
            })
            .clone()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryOrdered {
    entries: Mutex<BTreeMap<u64, Value>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl OrderedStore for MemoryOrdered {
    async fn put(&self, key: u64, value: Value) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.entries.lock().await.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: u64, exact: bool) -> Result<Option<(u64, Value)>, StoreError> {
        let entries = self.entries.lock().await;
        let entry = if exact {
            entries.get_key_value(&key)
        } else {
            entries.range(..=key).next_back()
        };
        Ok(entry.map(|(k, v)| (*k, v.clone())))
    }

    async fn newest(&self) -> Result<Option<(u64, Value)>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.last_key_value().map(|(k, v)| (*k, v.clone())))
    }
}

#[derive(Debug)]
struct MemoryKeyed {
    entries: Mutex<HashMap<String, String>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl KeyValueStore for MemoryKeyed {
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ordered_exact_and_nearest() {
        let store = MemoryStore::new();
        let ordered = store.ordered("aggregates");
        ordered.put(10, json!(1)).await.unwrap();
        ordered.put(20, json!(2)).await.unwrap();

        assert_eq!(ordered.get(10, true).await.unwrap(), Some((10, json!(1))));
        assert_eq!(ordered.get(15, true).await.unwrap(), None);
        assert_eq!(ordered.get(15, false).await.unwrap(), Some((10, json!(1))));
        assert_eq!(ordered.get(25, false).await.unwrap(), Some((20, json!(2))));
        assert_eq!(ordered.get(5, false).await.unwrap(), None);
        assert_eq!(ordered.newest().await.unwrap(), Some((20, json!(2))));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated_and_shared() {
        let store = MemoryStore::new();
        store.ordered("a").put(1, json!("a")).await.unwrap();

        assert_eq!(store.ordered("b").newest().await.unwrap(), None);
        assert_eq!(
            store.clone().ordered("a").newest().await.unwrap(),
            Some((1, json!("a")))
        );
    }

    #[tokio::test]
    async fn test_closed_store_rejects_writes() {
        let store = MemoryStore::new();
        let keyed = store.keyed("tags");
        store.close().await.unwrap();

        assert!(matches!(
            keyed.put("k", "v".into()).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.ordered("x").put(1, json!(null)).await,
            Err(StoreError::Closed)
        ));
    }
}
