// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-block aggregation of decoded records
//!
//! A [`Producer`] consumes the records of one `(artifact, event)` pair and
//! rolls them up into a persisted per-block shape. The connector drives it
//! with two calls:
//!
//! - [`add`](Producer::add) for every record, in chain order
//! - [`save_block`](Producer::save_block) whenever the block advances; this
//!   is the only point at which accumulated state is flushed
//!
//! Producers are looked up by name through an explicit [`ProducerRegistry`]
//! built once at setup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::ChainArtifact;
use crate::errors::{ConnectorError, ProducerError};
use crate::store::Store;

mod supply;

pub use supply::{SupplyAggregate, SupplyProducer, SupplySnapshot};

/// Per-block aggregation engine
#[async_trait]
pub trait Producer<R>: Send + Sync {
    /// Unique name, used for logging and persisted state keys
    fn name(&self) -> &str;

    /// Restores persisted state; called once by `Connector::init`
    async fn init(&self) -> Result<(), ProducerError>;

    /// Folds `record` into the current block's accumulators
    async fn add(&self, record: &R) -> Result<(), ProducerError>;

    /// Marks `block` as the current block, flushing the previous one if
    /// `block` is ahead of it
    async fn save_block(&self, block: u64) -> Result<(), ProducerError>;
}

/// What a producer factory gets to build a producer with
#[derive(Clone)]
pub struct ProducerSetup {
    /// Backing store for aggregates and snapshots
    pub store: Arc<dyn Store>,
    /// Contract whose events the producer consumes
    pub artifact: ChainArtifact,
}

impl fmt::Debug for ProducerSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerSetup")
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

/// Builds a producer for one connector
pub type ProducerFactory<R> = Arc<dyn Fn(&ProducerSetup) -> Arc<dyn Producer<R>> + Send + Sync>;

/// Table of producer factories keyed by name
///
/// ```rust,ignore
/// use eventfold::producer::{ProducerRegistry, SupplyProducer};
///
/// let mut producers = ProducerRegistry::new();
/// producers.register("supply", |setup| SupplyProducer::for_token(setup));
/// connector.add_named_producer("Transfer", "supply", &producers)?;
/// ```
pub struct ProducerRegistry<R> {
    factories: BTreeMap<String, ProducerFactory<R>>,
}

impl<R> ProducerRegistry<R> {
    /// Creates an empty table
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registers `factory` under `name`
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::DuplicateRegistration`] if `name` is taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), ConnectorError>
    where
        F: Fn(&ProducerSetup) -> Arc<dyn Producer<R>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ConnectorError::duplicate("producer factory", name));
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builds the producer registered under `name`
    pub fn build(&self, name: &str, setup: &ProducerSetup) -> Option<Arc<dyn Producer<R>>> {
        self.factories.get(name).map(|factory| factory(setup))
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl<R> Default for ProducerRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for ProducerRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
