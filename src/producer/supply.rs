// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Token supply tracking from mint and burn transfers
//!
//! [`SupplyProducer`] classifies each transfer of one token:
//!
//! - from the mint address: a mint
//! - otherwise, to the burn address: a burn
//! - anything else: an ordinary transfer, ignored
//!
//! Both checks compare tags, so the zero-address self transfer that some
//! tokens emit counts as a mint. Mints and burns of a block are summed and
//! flushed as one [`SupplyAggregate`] when `save_block` moves past the block.
//! Blocks without mints or burns are never written; use
//! [`aggregate_at`](SupplyProducer::aggregate_at) for nearest-at-or-below
//! reads.
//!
//! The accumulators are snapshotted after every call, so a restarted producer
//! continues the block it was in without counting anything twice.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, Instrument};

use super::{Producer, ProducerSetup};
use crate::artifact::ChainArtifact;
use crate::config::constants::{namespaces, BURN_ADDRESS, MINT_ADDRESS};
use crate::errors::{ProducerError, StoreError};
use crate::spans;
use crate::store::{KeyValueStore, OrderedLog, Store};
use crate::tag::{ArtifactTagger, Tag};
use crate::token::TokenRecord;

/// Decimal string serialization for big integers
mod decimal {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(super) fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

fn to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

/// Supply change of one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyAggregate {
    /// Sum of minted amounts
    #[serde(with = "decimal")]
    pub minted: BigUint,
    /// Sum of burned amounts
    #[serde(with = "decimal")]
    pub burned: BigUint,
    /// `minted - burned`
    #[serde(with = "decimal")]
    pub supply_delta: BigInt,
    /// Running supply after this block, relative to where indexing began
    #[serde(with = "decimal")]
    pub total_supply: BigInt,
    /// Number of mint transfers
    pub mints: u64,
    /// Number of burn transfers
    pub burns: u64,
}

/// Persisted producer state between flushes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplySnapshot {
    /// Block being accumulated
    pub current_block: Option<u64>,
    /// Log index of the last transfer applied in `current_block`
    pub last_log_index: Option<u64>,
    /// Minted so far in `current_block`
    #[serde(with = "decimal")]
    pub minted: BigUint,
    /// Burned so far in `current_block`
    #[serde(with = "decimal")]
    pub burned: BigUint,
    /// Mints so far in `current_block`
    pub mints: u64,
    /// Burns so far in `current_block`
    pub burns: u64,
    /// Running supply as of the last flush
    #[serde(with = "decimal")]
    pub total_supply: BigInt,
}

impl SupplySnapshot {
    fn has_activity(&self) -> bool {
        self.mints > 0 || self.burns > 0
    }

    fn reset_block(&mut self, block: u64) {
        self.current_block = Some(block);
        self.last_log_index = None;
        self.minted = BigUint::default();
        self.burned = BigUint::default();
        self.mints = 0;
        self.burns = 0;
    }
}

/// Per-block mint/burn/supply aggregation for one token
pub struct SupplyProducer {
    name: String,
    mint_tag: Tag,
    burn_tag: Tag,
    aggregates: OrderedLog<SupplyAggregate>,
    snapshots: Arc<dyn KeyValueStore>,
    state: Mutex<SupplySnapshot>,
}

impl fmt::Debug for SupplyProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupplyProducer")
            .field("name", &self.name)
            .field("mint_tag", &self.mint_tag)
            .field("burn_tag", &self.burn_tag)
            .finish_non_exhaustive()
    }
}

impl SupplyProducer {
    /// Producer for `token` with explicit mint and burn tags
    pub fn new(store: &dyn Store, token: &ChainArtifact, mint_tag: Tag, burn_tag: Tag) -> Self {
        let name = format!("supply:{}", token.canonical());
        Self {
            aggregates: OrderedLog::new(
                store.ordered(&format!("{}/{name}", namespaces::AGGREGATES)),
            ),
            snapshots: store.keyed(namespaces::PRODUCERS),
            name,
            mint_tag,
            burn_tag,
            state: Mutex::new(SupplySnapshot::default()),
        }
    }

    /// Producer for the token in `setup`, using the conventional zero-address
    /// mint and burn accounts of its chain
    pub fn for_token(setup: &ProducerSetup) -> Self {
        let chain = setup.artifact.chain();
        Self::new(
            setup.store.as_ref(),
            &setup.artifact,
            ArtifactTagger::tag(&ChainArtifact::account(chain, MINT_ADDRESS)),
            ArtifactTagger::tag(&ChainArtifact::account(chain, BURN_ADDRESS)),
        )
    }

    /// Aggregate of `block`, or of the nearest flushed block below it
    pub async fn aggregate_at(&self, block: u64) -> Result<Option<(u64, SupplyAggregate)>, StoreError> {
        self.aggregates.at_or_below(block).await
    }

    /// Copy of the in-memory accumulator state
    pub async fn snapshot(&self) -> SupplySnapshot {
        self.state.lock().await.clone()
    }

    /// Running supply as of the last flush
    pub async fn total_supply(&self) -> BigInt {
        self.state.lock().await.total_supply.clone()
    }

    async fn persist(&self, state: &SupplySnapshot) -> Result<(), ProducerError> {
        let json = serde_json::to_string(state).map_err(StoreError::from)?;
        self.snapshots.put(&self.name, json).await?;
        Ok(())
    }

    async fn flush(&self, block: u64, state: &mut SupplySnapshot) -> Result<(), ProducerError> {
        let supply_delta = BigInt::from(state.minted.clone()) - BigInt::from(state.burned.clone());
        let total_supply = &state.total_supply + &supply_delta;
        let aggregate = SupplyAggregate {
            minted: state.minted.clone(),
            burned: state.burned.clone(),
            supply_delta,
            total_supply: total_supply.clone(),
            mints: state.mints,
            burns: state.burns,
        };

        self.aggregates.put(block, &aggregate).await?;
        state.total_supply = total_supply;

        debug!(
            producer = %self.name,
            block_number = block,
            minted = %aggregate.minted,
            burned = %aggregate.burned,
            supply_delta = %aggregate.supply_delta,
            "Flushed supply aggregate"
        );
        Ok(())
    }
}

#[async_trait]
impl Producer<TokenRecord> for SupplyProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ProducerError> {
        let Some(raw) = self.snapshots.get(&self.name).await? else {
            debug!(producer = %self.name, "No snapshot, starting empty");
            return Ok(());
        };
        let mut restored: SupplySnapshot = serde_json::from_str(&raw).map_err(StoreError::from)?;

        // The flush of the snapshot's block is durable but the snapshot
        // that follows it is not: its accumulators are already counted.
        if let Some(block) = restored.current_block {
            if let Some(flushed) = self.aggregates.exact(block).await? {
                info!(
                    producer = %self.name,
                    block_number = block,
                    "Snapshot block already flushed, discarding its accumulators"
                );
                restored.reset_block(block);
                restored.last_log_index = Some(u64::MAX);
                restored.total_supply = flushed.total_supply;
            }
        }

        info!(
            producer = %self.name,
            current_block = ?restored.current_block,
            total_supply = %restored.total_supply,
            "Restored supply producer"
        );
        *self.state.lock().await = restored;
        Ok(())
    }

    async fn add(&self, record: &TokenRecord) -> Result<(), ProducerError> {
        let TokenRecord::Transfer(transfer) = record else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        if state.current_block != Some(transfer.block_number) {
            return Err(ProducerError::OutOfOrder {
                producer: self.name.clone(),
                current: state.current_block,
                received: transfer.block_number,
            });
        }
        if state
            .last_log_index
            .is_some_and(|last| transfer.log_index <= last)
        {
            trace!(
                producer = %self.name,
                block_number = transfer.block_number,
                log_index = transfer.log_index,
                "Transfer already applied"
            );
            return Ok(());
        }

        if transfer.from == self.mint_tag {
            state.minted += to_biguint(transfer.value);
            state.mints += 1;
        } else if transfer.to == self.burn_tag {
            state.burned += to_biguint(transfer.value);
            state.burns += 1;
        }
        state.last_log_index = Some(transfer.log_index);

        self.persist(&state).await
    }

    async fn save_block(&self, block: u64) -> Result<(), ProducerError> {
        let mut state = self.state.lock().await;
        if state.current_block.is_some_and(|current| block <= current) {
            return Ok(());
        }

        if let Some(current) = state.current_block {
            if state.has_activity() {
                self.flush(current, &mut state)
                    .instrument(spans::producer_flush(&self.name, current))
                    .await?;
            }
        }
        state.reset_block(block);

        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::token::TransferRecord;
    use alloy_chains::Chain;
    use alloy_primitives::{address, Address};

    fn setup(store: &MemoryStore) -> ProducerSetup {
        ProducerSetup {
            store: Arc::new(store.clone()),
            artifact: ChainArtifact::erc20(
                Chain::mainnet(),
                address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            ),
        }
    }

    fn account(address: Address) -> Tag {
        ArtifactTagger::tag(&ChainArtifact::account(Chain::mainnet(), address))
    }

    fn transfer(block: u64, log_index: u64, from: Address, to: Address, value: u64) -> TokenRecord {
        TokenRecord::Transfer(TransferRecord {
            block_number: block,
            log_index,
            transaction_hash: None,
            from: account(from),
            to: account(to),
            value: U256::from(value),
        })
    }

    const ALICE: Address = address!("1111111111111111111111111111111111111111");
    const BOB: Address = address!("2222222222222222222222222222222222222222");

    #[tokio::test]
    async fn test_mint_and_burn_in_one_block() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));
        producer.init().await.unwrap();

        producer.save_block(10).await.unwrap();
        producer.add(&transfer(10, 0, Address::ZERO, ALICE, 100)).await.unwrap();
        producer.add(&transfer(10, 1, BOB, Address::ZERO, 40)).await.unwrap();
        assert!(producer.aggregate_at(10).await.unwrap().is_none());

        producer.save_block(11).await.unwrap();

        let (block, aggregate) = producer.aggregate_at(10).await.unwrap().unwrap();
        assert_eq!(block, 10);
        assert_eq!(aggregate.minted, BigUint::from(100u32));
        assert_eq!(aggregate.burned, BigUint::from(40u32));
        assert_eq!(aggregate.supply_delta, BigInt::from(60));
        assert_eq!(aggregate.total_supply, BigInt::from(60));
        assert_eq!((aggregate.mints, aggregate.burns), (1, 1));
    }

    #[tokio::test]
    async fn test_ordinary_transfers_never_flush() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));

        producer.save_block(5).await.unwrap();
        producer.add(&transfer(5, 0, ALICE, BOB, 7)).await.unwrap();
        producer.save_block(6).await.unwrap();

        assert!(producer.aggregate_at(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_to_zero_counts_as_mint() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));

        producer.save_block(1).await.unwrap();
        producer.add(&transfer(1, 0, Address::ZERO, Address::ZERO, 5)).await.unwrap();
        producer.save_block(2).await.unwrap();

        let (_, aggregate) = producer.aggregate_at(1).await.unwrap().unwrap();
        assert_eq!((aggregate.mints, aggregate.burns), (1, 0));
    }

    #[tokio::test]
    async fn test_record_for_other_block_is_out_of_order() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));

        let err = producer
            .add(&transfer(3, 0, Address::ZERO, ALICE, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::OutOfOrder { current: None, received: 3, .. }));

        producer.save_block(4).await.unwrap();
        let err = producer
            .add(&transfer(5, 0, Address::ZERO, ALICE, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::OutOfOrder { current: Some(4), .. }));
    }

    #[tokio::test]
    async fn test_replayed_transfer_is_ignored() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));

        producer.save_block(8).await.unwrap();
        producer.add(&transfer(8, 2, Address::ZERO, ALICE, 10)).await.unwrap();
        producer.add(&transfer(8, 2, Address::ZERO, ALICE, 10)).await.unwrap();
        producer.save_block(8).await.unwrap();

        let snapshot = producer.snapshot().await;
        assert_eq!(snapshot.minted, BigUint::from(10u32));
        assert_eq!(snapshot.current_block, Some(8));
    }

    #[tokio::test]
    async fn test_restart_continues_open_block() {
        let store = MemoryStore::new();
        let first = SupplyProducer::for_token(&setup(&store));
        first.save_block(10).await.unwrap();
        first.add(&transfer(10, 0, Address::ZERO, ALICE, 100)).await.unwrap();
        drop(first);

        let second = SupplyProducer::for_token(&setup(&store));
        second.init().await.unwrap();
        // Replay of the already applied transfer, then the rest of the block
        second.save_block(10).await.unwrap();
        second.add(&transfer(10, 0, Address::ZERO, ALICE, 100)).await.unwrap();
        second.add(&transfer(10, 1, BOB, Address::ZERO, 40)).await.unwrap();
        second.save_block(11).await.unwrap();

        let (_, aggregate) = second.aggregate_at(10).await.unwrap().unwrap();
        assert_eq!(aggregate.supply_delta, BigInt::from(60));
    }

    #[tokio::test]
    async fn test_restart_after_flush_before_snapshot() {
        let store = MemoryStore::new();
        let producer = SupplyProducer::for_token(&setup(&store));
        producer.save_block(10).await.unwrap();
        producer.add(&transfer(10, 0, Address::ZERO, ALICE, 100)).await.unwrap();

        // Flush landed, snapshot still describes block 10
        let stale = producer.snapshot().await;
        producer.save_block(11).await.unwrap();
        let keyed = store.keyed(namespaces::PRODUCERS);
        keyed
            .put(producer.name(), serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();

        let restarted = SupplyProducer::for_token(&setup(&store));
        restarted.init().await.unwrap();
        restarted.add(&transfer(10, 0, Address::ZERO, ALICE, 100)).await.unwrap();
        restarted.save_block(11).await.unwrap();
        restarted.save_block(12).await.unwrap();

        assert_eq!(restarted.total_supply().await, BigInt::from(100));
        assert!(restarted.aggregate_at(11).await.unwrap().is_some_and(|(block, _)| block == 10));
    }

    #[test]
    fn test_aggregate_serializes_decimal_strings() {
        let aggregate = SupplyAggregate {
            minted: BigUint::from(10u32).pow(30),
            burned: BigUint::default(),
            supply_delta: BigInt::from(10u32).pow(30),
            total_supply: BigInt::from(-5),
            mints: 1,
            burns: 0,
        };

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["minted"], format!("1{}", "0".repeat(30)));
        assert_eq!(json["totalSupply"], "-5");

        let back: SupplyAggregate = serde_json::from_value(json).unwrap();
        assert_eq!(back, aggregate);
    }
}
