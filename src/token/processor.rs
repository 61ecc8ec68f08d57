// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Decoders for ERC-20 events

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

use super::{ApprovalRecord, TokenRecord, TransferRecord};
use crate::connector::{EventProcessor, ProcessorContext};
use crate::errors::EventProcessingError;
use crate::indexer::IndexedEvent;

fn arg<'a>(
    event: &'a IndexedEvent,
    position: usize,
    field: &str,
) -> Result<&'a DynSolValue, EventProcessingError> {
    event
        .args
        .get(position)
        .ok_or_else(|| EventProcessingError::missing_field(&event.event, field))
}

fn address_arg(event: &IndexedEvent, position: usize, field: &str) -> Result<Address, EventProcessingError> {
    let value = arg(event, position, field)?;
    value.as_address().ok_or_else(|| {
        EventProcessingError::decode_failed(format!(
            "{} field {field} is not an address: {value:?}",
            event.event
        ))
    })
}

fn uint_arg(event: &IndexedEvent, position: usize, field: &str) -> Result<U256, EventProcessingError> {
    let value = arg(event, position, field)?;
    value.as_uint().map(|(amount, _)| amount).ok_or_else(|| {
        EventProcessingError::decode_failed(format!(
            "{} field {field} is not an unsigned integer: {value:?}",
            event.event
        ))
    })
}

/// Decodes `Transfer(from, to, value)` and tags both parties
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferProcessor;

#[async_trait]
impl EventProcessor<TokenRecord> for TransferProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        event: &IndexedEvent,
    ) -> Result<TokenRecord, EventProcessingError> {
        let from = address_arg(event, 0, "from")?;
        let to = address_arg(event, 1, "to")?;
        let value = uint_arg(event, 2, "value")?;

        let tags = ctx
            .tag_and_resolve(&[ctx.account(from), ctx.account(to)])
            .await?;

        Ok(TokenRecord::Transfer(TransferRecord {
            block_number: event.block_number,
            log_index: event.log_index,
            transaction_hash: event.transaction_hash,
            from: tags[0],
            to: tags[1],
            value,
        }))
    }
}

/// Decodes `Approval(owner, spender, value)` and tags both parties
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalProcessor;

#[async_trait]
impl EventProcessor<TokenRecord> for ApprovalProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        event: &IndexedEvent,
    ) -> Result<TokenRecord, EventProcessingError> {
        let owner = address_arg(event, 0, "owner")?;
        let spender = address_arg(event, 1, "spender")?;
        let value = uint_arg(event, 2, "value")?;

        let tags = ctx
            .tag_and_resolve(&[ctx.account(owner), ctx.account(spender)])
            .await?;

        Ok(TokenRecord::Approval(ApprovalRecord {
            block_number: event.block_number,
            log_index: event.log_index,
            transaction_hash: event.transaction_hash,
            owner: tags[0],
            spender: tags[1],
            value,
        }))
    }
}
