// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Chain log sources
//!
//! A [`LogSource`] answers three questions for an indexer: which events
//! matching a subscription exist in a block range, what arrives live from now
//! on, and how far the chain has progressed. Events come back already
//! decoded into positional ABI values.
//!
//! [`ProviderLogSource`] implements the trait over any Alloy provider.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::B256;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::RpcError;
use crate::indexer::Subscription;

mod provider;

pub use provider::ProviderLogSource;

/// One decoded log as delivered by a source
///
/// Fields are optional because pending and reorged logs may lack them; the
/// indexer drops events without a block number.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    /// Block the log was included in
    pub block_number: Option<u64>,
    /// Position of the log within its block
    pub log_index: Option<u64>,
    /// Transaction that emitted the log
    pub transaction_hash: Option<B256>,
    /// Whether the log was removed by a reorg
    pub removed: bool,
    /// Event arguments in declaration order, indexed and non-indexed alike
    pub args: Vec<DynSolValue>,
}

/// Live stream of events for one subscription
///
/// The stream ending means the subscription was lost; the indexer
/// resubscribes.
pub type SourceEventStream = BoxStream<'static, SourceEvent>;

/// Supplier of decoded events, historical and live
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Events matching `subscription` in `[from, to]`, ordered by block
    /// number and log index
    async fn query(
        &self,
        subscription: &Subscription,
        from: u64,
        to: u64,
    ) -> Result<Vec<SourceEvent>, RpcError>;

    /// Push delivery of events matching `subscription` from now on
    async fn subscribe(&self, subscription: &Subscription) -> Result<SourceEventStream, RpcError>;

    /// Latest known block number
    ///
    /// Advances between calls.
    async fn head(&self) -> Result<u64, RpcError>;
}
