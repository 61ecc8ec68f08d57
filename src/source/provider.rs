// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! [`LogSource`] over an Alloy provider.
//!
//! Historical ranges use `eth_getLogs`. Live delivery uses a `logs` pub/sub
//! subscription when the `ws` feature is enabled, and a polled log filter
//! (`eth_newFilter` / `eth_getFilterChanges`) otherwise.
//!
//! # Provider Setup
//!
//! ```rust,ignore
//! use alloy_provider::ProviderBuilder;
//! use eventfold::source::ProviderLogSource;
//!
//! let provider = ProviderBuilder::new().connect_http(rpc_url);
//! let source = ProviderLogSource::new(provider)
//!     .with_signature("event Transfer(address indexed from, address indexed to, uint256 value)")?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use alloy_dyn_abi::EventExt;
use alloy_json_abi::Event;
use alloy_provider::Provider;
use alloy_rpc_types::{Filter, Log};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{LogSource, SourceEvent, SourceEventStream};
use crate::errors::RpcError;
use crate::indexer::Subscription;

/// Chain log source backed by an Alloy provider
///
/// The source needs the ABI of every event it serves, registered by name
/// with [`with_event`](Self::with_event) or
/// [`with_signature`](Self::with_signature).
pub struct ProviderLogSource<P> {
    provider: P,
    events: HashMap<String, Arc<Event>>,
}

impl<P> ProviderLogSource<P>
where
    P: Provider + 'static,
{
    /// Creates a source with no events registered
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            events: HashMap::new(),
        }
    }

    /// Registers an event ABI under its name
    pub fn with_event(mut self, event: Event) -> Self {
        self.events.insert(event.name.clone(), Arc::new(event));
        self
    }

    /// Registers an event from its human-readable signature
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidRequest`] if the signature does not parse.
    pub fn with_signature(self, signature: &str) -> Result<Self, RpcError> {
        let event = Event::parse(signature).map_err(|e| {
            RpcError::invalid_request(format!("unparseable event signature '{signature}': {e}"))
        })?;
        Ok(self.with_event(event))
    }

    fn event(&self, subscription: &Subscription) -> Result<Arc<Event>, RpcError> {
        self.events.get(&subscription.event).cloned().ok_or_else(|| {
            RpcError::invalid_request(format!("no ABI registered for event {}", subscription.event))
        })
    }

    fn filter(&self, subscription: &Subscription, event: &Event) -> Result<Filter, RpcError> {
        let address = subscription.artifact.address().ok_or_else(|| {
            RpcError::invalid_request(format!(
                "artifact {} has no contract address",
                subscription.artifact
            ))
        })?;

        let mut filter = Filter::new().address(address);
        if !event.anonymous {
            filter = filter.event_signature(event.selector());
        }
        for (position, topic) in subscription.filter.constraints() {
            filter = match position {
                1 => filter.topic1(topic),
                2 => filter.topic2(topic),
                _ => filter.topic3(topic),
            };
        }
        Ok(filter)
    }
}

/// Decodes a raw log into positional arguments
///
/// Indexed and body values are merged back into declaration order.
fn decode(event: &Event, log: &Log) -> Option<SourceEvent> {
    let decoded = match event.decode_log(&log.inner.data) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(
                event = %event.name,
                block_number = ?log.block_number,
                log_index = ?log.log_index,
                error = %e,
                "Failed to decode log, skipping"
            );
            return None;
        }
    };

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    let args = event
        .inputs
        .iter()
        .filter_map(|param| {
            if param.indexed {
                indexed.next()
            } else {
                body.next()
            }
        })
        .collect();

    Some(SourceEvent {
        block_number: log.block_number,
        log_index: log.log_index,
        transaction_hash: log.transaction_hash,
        removed: log.removed,
        args,
    })
}

#[async_trait]
impl<P> LogSource for ProviderLogSource<P>
where
    P: Provider + 'static,
{
    async fn query(
        &self,
        subscription: &Subscription,
        from: u64,
        to: u64,
    ) -> Result<Vec<SourceEvent>, RpcError> {
        let event = self.event(subscription)?;
        let filter = self
            .filter(subscription, &event)?
            .from_block(from)
            .to_block(to);

        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            RpcError::get_logs_failed(format!("{} {from}-{to}", subscription.event), e)
        })?;

        let mut events: Vec<SourceEvent> = logs.iter().filter_map(|log| decode(&event, log)).collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));

        debug!(
            event = %subscription.event,
            from_block = from,
            to_block = to,
            logs_count = logs.len(),
            decoded_count = events.len(),
            "Fetched logs"
        );
        Ok(events)
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<SourceEventStream, RpcError> {
        let event = self.event(subscription)?;
        let filter = self.filter(subscription, &event)?;

        info!(
            event = %subscription.event,
            address = ?filter.address,
            topics = ?filter.topics,
            "Subscribing to logs"
        );

        #[cfg(feature = "ws")]
        let logs = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| RpcError::subscription_failed("logs", e))?
            .into_stream()
            .boxed();

        #[cfg(not(feature = "ws"))]
        let logs = self
            .provider
            .watch_logs(&filter)
            .await
            .map_err(|e| RpcError::subscription_failed("logs", e))?
            .into_stream()
            .flat_map(futures::stream::iter)
            .boxed();

        Ok(logs
            .filter_map(move |log| futures::future::ready(decode(&event, &log)))
            .boxed())
    }

    async fn head(&self) -> Result<u64, RpcError> {
        self.provider
            .get_block_number()
            .await
            .map_err(RpcError::get_block_number_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::definitions::Transfer;
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{address, U256};
    use alloy_sol_types::SolEvent;

    fn transfer_abi() -> Event {
        Event::parse("event Transfer(address indexed from, address indexed to, uint256 value)")
            .unwrap()
    }

    fn rpc_log(data: alloy_primitives::LogData) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                data,
            },
            block_number: Some(12),
            log_index: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_restores_declaration_order() {
        let from = address!("1111111111111111111111111111111111111111");
        let to = address!("2222222222222222222222222222222222222222");
        let transfer = Transfer {
            from,
            to,
            value: U256::from(500u64),
        };

        let event = decode(&transfer_abi(), &rpc_log(transfer.encode_log_data())).unwrap();

        assert_eq!(event.block_number, Some(12));
        assert_eq!(event.log_index, Some(3));
        assert_eq!(
            event.args,
            vec![
                DynSolValue::Address(from),
                DynSolValue::Address(to),
                DynSolValue::Uint(U256::from(500u64), 256),
            ]
        );
    }

    #[test]
    fn test_decode_wrong_event_is_skipped() {
        let approval = Event::parse(
            "event Approval(address indexed owner, address indexed spender, uint256 value)",
        )
        .unwrap();
        let transfer = Transfer {
            from: Default::default(),
            to: Default::default(),
            value: U256::from(1u64),
        };

        assert!(decode(&approval, &rpc_log(transfer.encode_log_data())).is_none());
    }
}
