// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! ERC-20 records, processors and the supply connector
//!
//! Addresses never reach a record in the clear: processors replace them with
//! [`Tag`]s through the connector's [`ProcessorContext`](crate::ProcessorContext).

use std::sync::Arc;

use alloy_primitives::{B256, U256};

use crate::artifact::ChainArtifact;
use crate::connector::{Connector, EventRecord};
use crate::errors::ConnectorError;
use crate::events::filter::EventFilter;
use crate::indexer::{StartBlock, Subscription};
use crate::producer::SupplyProducer;
use crate::registry::Registry;
use crate::tag::{Tag, TagMode};

mod processor;

pub use processor::{ApprovalProcessor, TransferProcessor};

/// Event name of ERC-20 transfers
pub const TRANSFER_EVENT: &str = "Transfer";

/// Event name of ERC-20 approvals
pub const APPROVAL_EVENT: &str = "Approval";

/// A decoded ERC-20 transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Block of the transfer
    pub block_number: u64,
    /// Log index of the transfer
    pub log_index: u64,
    /// Emitting transaction, when known
    pub transaction_hash: Option<B256>,
    /// Tag of the sender account
    pub from: Tag,
    /// Tag of the receiver account
    pub to: Tag,
    /// Amount in base units
    pub value: U256,
}

/// A decoded ERC-20 approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    /// Block of the approval
    pub block_number: u64,
    /// Log index of the approval
    pub log_index: u64,
    /// Emitting transaction, when known
    pub transaction_hash: Option<B256>,
    /// Tag of the owner account
    pub owner: Tag,
    /// Tag of the spender account
    pub spender: Tag,
    /// Approved allowance
    pub value: U256,
}

/// Any ERC-20 record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRecord {
    /// `Transfer(from, to, value)`
    Transfer(TransferRecord),
    /// `Approval(owner, spender, value)`
    Approval(ApprovalRecord),
}

impl EventRecord for TokenRecord {
    fn block_number(&self) -> u64 {
        match self {
            TokenRecord::Transfer(r) => r.block_number,
            TokenRecord::Approval(r) => r.block_number,
        }
    }

    fn log_index(&self) -> u64 {
        match self {
            TokenRecord::Transfer(r) => r.log_index,
            TokenRecord::Approval(r) => r.log_index,
        }
    }
}

/// Connector tracking the supply of `token` from its `Transfer` events
///
/// The chain's log source must already be registered with `registry`. Call
/// `init` and `start` on the result.
///
/// ```rust,ignore
/// let mut connector = supply_connector(&registry, usdc, StartBlock::Number(6_082_465))?;
/// connector.init().await?;
/// let handle = connector.start()?;
/// ```
pub fn supply_connector(
    registry: &Registry,
    token: ChainArtifact,
    start: StartBlock,
) -> Result<Connector<TokenRecord>, ConnectorError> {
    let subscription = Subscription::new(token.clone(), TRANSFER_EVENT, EventFilter::any(), start);
    let producer = SupplyProducer::for_token(&registry.producer_setup(token.clone()));

    let mut connector = registry.connector(token, TagMode::Resolve)?;
    connector.add_indexer(TRANSFER_EVENT, registry.indexer(subscription)?)?;
    connector.add_event_processor(TRANSFER_EVENT, Arc::new(TransferProcessor))?;
    connector.add_producer(TRANSFER_EVENT, Arc::new(producer))?;
    Ok(connector)
}
