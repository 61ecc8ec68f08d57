// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The registry owning everything indexers and connectors share
//!
//! A [`Registry`] holds the configuration, the store, one rate limiter per
//! `(chain, provider)` and the log source of every chain. Indexers and
//! connectors are built from it, so their collaborators are passed in
//! explicitly rather than looked up globally.
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventfold::{EventfoldConfig, ProviderKind, Registry};
//! use eventfold::store::DiskStore;
//! use eventfold::source::ProviderLogSource;
//!
//! let store = Arc::new(DiskStore::open("/var/lib/eventfold").await?);
//! let registry = Registry::open(EventfoldConfig::default(), store);
//! registry.register_source(
//!     Chain::mainnet(),
//!     ProviderKind::Alchemy,
//!     Arc::new(ProviderLogSource::new(provider).with_signature(TRANSFER_SIGNATURE)?),
//! );
//!
//! let mut connector = supply_connector(&registry, usdc, StartBlock::Number(6_082_465))?;
//! // ...
//! registry.close().await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use alloy_chains::Chain;
use tracing::{debug, info};

use crate::artifact::ChainArtifact;
use crate::config::constants::namespaces;
use crate::config::EventfoldConfig;
use crate::config_types::ProviderKind;
use crate::connector::{Connector, EventRecord};
use crate::errors::{ConnectorError, StoreError};
use crate::indexer::{EventIndexer, IndexerSettings, Subscription};
use crate::producer::ProducerSetup;
use crate::source::LogSource;
use crate::store::{CheckpointLog, Store};
use crate::tag::{ArtifactResolver, TagMode};
use crate::transport::{RateLimiter, RateLimiterRegistry};

#[derive(Clone)]
struct RegisteredSource {
    provider: ProviderKind,
    source: Arc<dyn LogSource>,
}

/// Shared collaborators of every indexer and connector in a process
pub struct Registry {
    config: EventfoldConfig,
    store: Arc<dyn Store>,
    limiters: RateLimiterRegistry,
    sources: RwLock<HashMap<Chain, RegisteredSource>>,
    closed: AtomicBool,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains: Vec<Chain> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("chains", &chains)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Opens a registry over `store`
    pub fn open(config: EventfoldConfig, store: Arc<dyn Store>) -> Self {
        info!(writer_id = %config.writer_id, "Registry opened");
        Self {
            config,
            store,
            limiters: RateLimiterRegistry::new(),
            sources: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EventfoldConfig {
        &self.config
    }

    /// Backing store
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ConnectorError> {
        if self.is_closed() {
            return Err(ConnectorError::RegistryClosed);
        }
        Ok(())
    }

    /// Sets the log source of `chain`, replacing any previous one
    pub fn register_source(&self, chain: Chain, provider: ProviderKind, source: Arc<dyn LogSource>) {
        debug!(chain = %chain, provider = %provider, "Registered log source");
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chain, RegisteredSource { provider, source });
    }

    /// Rate limiter shared by every caller of `chain` through `provider`
    pub fn rate_limiter(&self, chain: Chain, provider: &ProviderKind) -> Arc<RateLimiter> {
        self.limiters.get_or_create(
            chain,
            provider.clone(),
            self.config.get_rate_limit(chain, provider),
        )
    }

    /// Builds an idle indexer for `subscription`
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::RegistryClosed`] after `close`
    /// - [`ConnectorError::Configuration`] if the artifact's chain has no source
    pub fn indexer(&self, subscription: Subscription) -> Result<EventIndexer, ConnectorError> {
        self.ensure_open()?;

        let chain = subscription.artifact.chain();
        let registered = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chain)
            .cloned()
            .ok_or_else(|| {
                ConnectorError::configuration(format!("no log source registered for chain {chain}"))
            })?;

        let settings = IndexerSettings {
            batch: self.config.get_max_block_range(chain, &registered.provider),
            retry: self.config.retry,
        };
        let checkpoints = CheckpointLog::new(
            self.store.ordered(&subscription.checkpoint_namespace()),
            subscription.id.to_string(),
            self.config.writer_id.clone(),
        );

        debug!(
            subscription_id = %subscription.id,
            event = %subscription.event,
            provider = %registered.provider,
            batch = %settings.batch,
            "Built indexer"
        );
        Ok(EventIndexer::new(
            subscription,
            registered.source,
            self.rate_limiter(chain, &registered.provider),
            checkpoints,
            settings,
        ))
    }

    /// Builds an empty connector for `artifact`
    pub fn connector<R: EventRecord>(
        &self,
        artifact: ChainArtifact,
        mode: TagMode,
    ) -> Result<Connector<R>, ConnectorError> {
        self.ensure_open()?;
        Ok(Connector::new(
            artifact,
            self.store(),
            self.resolver(),
            mode,
        ))
    }

    /// Resolver persisting tags in this registry's store
    pub fn resolver(&self) -> ArtifactResolver {
        ArtifactResolver::new(self.store.keyed(namespaces::TAGS))
    }

    /// Inputs for producer factories
    pub fn producer_setup(&self, artifact: ChainArtifact) -> ProducerSetup {
        ProducerSetup {
            store: self.store(),
            artifact,
        }
    }

    /// Flushes and closes the store; nothing can be built afterwards
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close().await?;
        info!("Registry closed");
        Ok(())
    }
}
