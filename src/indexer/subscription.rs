// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Subscriptions and their stable identities

use std::fmt;

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::artifact::ChainArtifact;
use crate::events::filter::EventFilter;

/// Stable identity of a subscription
///
/// Derived from the artifact, event name and filter only, so logically
/// identical subscriptions built independently (or in another process run)
/// share one checkpoint line.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(B256);

impl SubscriptionId {
    /// Identity of `(artifact, event, filter)`
    pub fn derive(artifact: &ChainArtifact, event: &str, filter: &EventFilter) -> Self {
        let preimage = format!("{}|{}|{}", artifact.canonical(), event, filter.canonical());
        Self(keccak256(preimage.as_bytes()))
    }

    /// Underlying hash
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

/// Where a subscription starts when it has no checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartBlock {
    /// Backfill from this block
    Number(u64),
    /// Only events from the current head onwards
    Latest,
}

impl From<u64> for StartBlock {
    fn from(block: u64) -> Self {
        StartBlock::Number(block)
    }
}

impl fmt::Display for StartBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartBlock::Number(block) => write!(f, "{block}"),
            StartBlock::Latest => f.write_str("latest"),
        }
    }
}

/// One event stream of one contract, narrowed by a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Identity shared by all equivalent subscriptions
    pub id: SubscriptionId,
    /// Contract emitting the events
    pub artifact: ChainArtifact,
    /// Event name, as registered with the log source
    pub event: String,
    /// Constraints on indexed arguments
    pub filter: EventFilter,
    /// Where to begin without a checkpoint
    pub start_block: StartBlock,
}

impl Subscription {
    /// Builds a subscription and derives its id
    ///
    /// ```rust
    /// use eventfold::{ChainArtifact, EventFilter, StartBlock, Subscription};
    /// use alloy_chains::Chain;
    /// use alloy_primitives::address;
    ///
    /// let usdc = ChainArtifact::erc20(
    ///     Chain::mainnet(),
    ///     address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
    /// );
    /// let a = Subscription::new(usdc.clone(), "Transfer", EventFilter::any(), StartBlock::Number(0));
    /// let b = Subscription::new(usdc, "Transfer", EventFilter::any(), StartBlock::Latest);
    /// assert_eq!(a.id, b.id);
    /// ```
    pub fn new(
        artifact: ChainArtifact,
        event: impl Into<String>,
        filter: EventFilter,
        start_block: impl Into<StartBlock>,
    ) -> Self {
        let event = event.into();
        Self {
            id: SubscriptionId::derive(&artifact, &event, &filter),
            artifact,
            event,
            filter,
            start_block: start_block.into(),
        }
    }

    /// Checkpoint namespace of this subscription
    pub fn checkpoint_namespace(&self) -> String {
        format!("{}/{}", crate::config::constants::namespaces::CHECKPOINTS, self.id)
    }
}
