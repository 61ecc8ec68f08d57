// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Resumable on-chain event ingestion for EVM chains
//!
//! eventfold turns a contract's event logs into durable per-block aggregates:
//!
//! - [`EventIndexer`] backfills historical ranges, hands off to live delivery
//!   and checkpoints after every event so it resumes exactly where it stopped
//! - [`RateLimiter`] bounds how many source calls start per time window,
//!   shared per `(chain, provider)`
//! - [`Connector`] routes each event through one processor, any number of
//!   [`Producer`]s and an optional post-processor
//! - [`SupplyProducer`](producer::SupplyProducer) is the reference producer,
//!   tracking mints, burns and running supply of an ERC-20 token
//! - [`ArtifactTagger`] and [`ArtifactResolver`] replace chain identifiers
//!   with fixed-width tags, optionally persisting the reverse lookup
//!
//! Everything shared lives in one [`Registry`] with an explicit open/close
//! lifecycle.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use alloy_chains::Chain;
//! use alloy_provider::ProviderBuilder;
//! use eventfold::events::definitions::TRANSFER_SIGNATURE;
//! use eventfold::source::ProviderLogSource;
//! use eventfold::store::DiskStore;
//! use eventfold::token::supply_connector;
//! use eventfold::{ChainArtifact, EventfoldConfigBuilder, ProviderKind, RateLimit, Registry, StartBlock};
//!
//! let config = EventfoldConfigBuilder::new()
//!     .max_block_range(2_000)
//!     .rate_limit(RateLimit::per_second(10))
//!     .build();
//! let registry = Registry::open(config, Arc::new(DiskStore::open("./data").await?));
//!
//! let provider = ProviderBuilder::new().connect_http(rpc_url);
//! let source = ProviderLogSource::new(provider).with_signature(TRANSFER_SIGNATURE)?;
//! registry.register_source(Chain::mainnet(), ProviderKind::Public, Arc::new(source));
//!
//! let usdc = ChainArtifact::erc20(Chain::mainnet(), usdc_address);
//! let mut connector = supply_connector(&registry, usdc, StartBlock::Number(6_082_465))?;
//! connector.init().await?;
//! connector.start()?.join().await?;
//! ```

mod artifact;
mod config;
mod config_types;
mod connector;
mod errors;
pub mod events;
mod indexer;
pub mod producer;
mod registry;
pub mod source;
mod spans;
pub mod store;
mod tag;
pub mod token;
pub mod transport;

pub use artifact::ChainArtifact;
pub use config::constants;
pub use config::{EventfoldConfig, EventfoldConfigBuilder, ProviderConfig};
pub use config_types::{ChunkIterator, MaxBlockRange, ProviderKind, RateLimit, RetryPolicy};
pub use connector::{
    Connector, ConnectorHandle, EventProcessor, EventRecord, PostProcessError, PostProcessor,
    ProcessorContext,
};
pub use errors::{
    ArtifactParseError, ConnectorError, EventProcessingError, EventfoldError, IndexerError,
    ProducerError, RpcError, StoreError, TagError,
};
pub use events::filter::EventFilter;
pub use indexer::{
    EventIndexer, EventSink, IndexedEvent, IndexerSettings, IndexerState, StartBlock,
    Subscription, SubscriptionId,
};
pub use producer::{Producer, ProducerRegistry, ProducerSetup};
pub use registry::Registry;
pub use tag::{ArtifactResolver, ArtifactTagger, Tag, TagMode};
pub use transport::{RateLimitLayer, RateLimiter, RateLimiterRegistry};
