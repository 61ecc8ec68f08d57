// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Event indexing: backfill, live hand-off and checkpointing
//!
//! An [`EventIndexer`] follows one [`Subscription`] through three states:
//!
//! ```text
//! Idle ──resume──▶ Importing ──caught up──▶ LiveSubscribed
//! ```
//!
//! While **importing** it walks fixed-width block ranges up to the chain head
//! (re-read every batch), hands each event to its [`EventSink`], and records
//! a checkpoint after every event plus a sealed one at the end of every range.
//!
//! Once the head is reached it goes **live**: it subscribes first, then runs
//! one more catch-up backfill so nothing between the last range and the
//! subscription start is missed, then drains the stream. Events the cursor
//! already covers are dropped. When the stream ends it resubscribes.
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventfold::{EventFilter, StartBlock, Subscription};
//!
//! let subscription = Subscription::new(usdc, "Transfer", EventFilter::any(), StartBlock::Number(18_000_000));
//! let mut indexer = registry.indexer(subscription)?;
//! indexer.attach(sink);
//!
//! let mut state = indexer.state_watcher();
//! let handle = indexer.spawn();
//! state.wait_for(|s| *s == IndexerState::LiveSubscribed).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::B256;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

use crate::config_types::{MaxBlockRange, RetryPolicy};
use crate::errors::{ConnectorError, IndexerError};
use crate::source::{LogSource, SourceEvent};
use crate::spans;
use crate::store::{CheckpointLog, Cursor};
use crate::transport::RateLimiter;

mod retry;
mod subscription;

pub(crate) use retry::with_retry;
pub use subscription::{StartBlock, Subscription, SubscriptionId};

/// Lifecycle state of an [`EventIndexer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexerState {
    /// Not started
    #[default]
    Idle,
    /// Backfilling historical ranges
    Importing,
    /// Caught up and receiving pushed events
    LiveSubscribed,
}

impl fmt::Display for IndexerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexerState::Idle => "idle",
            IndexerState::Importing => "importing",
            IndexerState::LiveSubscribed => "live",
        };
        f.write_str(name)
    }
}

/// A validated event ready for processing
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEvent {
    /// Event name
    pub event: String,
    /// Block the event was emitted in
    pub block_number: u64,
    /// Log index within the block, or arrival order when the source omits it
    pub log_index: u64,
    /// Position among this subscription's events in the same block
    pub index_in_block: u32,
    /// Emitting transaction, when known
    pub transaction_hash: Option<B256>,
    /// Decoded arguments in declaration order
    pub args: Vec<DynSolValue>,
}

/// Receiver of an indexer's output
///
/// Implemented by the connector's per-event routes. Errors are fatal to the
/// indexer task.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handles one event; events arrive in `(block_number, index_in_block)` order
    async fn on_event(&self, event: &IndexedEvent) -> Result<(), ConnectorError>;

    /// Every event at or below `block` has been delivered
    async fn on_block(&self, block: u64) -> Result<(), ConnectorError>;
}

/// Tunables of one indexer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerSettings {
    /// Width of each backfill query
    pub batch: MaxBlockRange,
    /// Backoff for failed source calls
    pub retry: RetryPolicy,
}

/// Assigns per-block positions in arrival order
#[derive(Debug, Default)]
struct BlockOrdinals {
    block: Option<u64>,
    next: u32,
}

impl BlockOrdinals {
    fn next(&mut self, block: u64) -> u32 {
        if self.block != Some(block) {
            self.block = Some(block);
            self.next = 0;
        }
        let ordinal = self.next;
        self.next = self.next.saturating_add(1);
        ordinal
    }
}

/// Backfills and follows one subscription
pub struct EventIndexer {
    subscription: Subscription,
    source: Arc<dyn LogSource>,
    limiter: Arc<RateLimiter>,
    checkpoints: CheckpointLog,
    settings: IndexerSettings,
    sink: Option<Arc<dyn EventSink>>,
    state: watch::Sender<IndexerState>,
}

impl fmt::Debug for EventIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventIndexer")
            .field("subscription", &self.subscription)
            .field("settings", &self.settings)
            .field("attached", &self.sink.is_some())
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl EventIndexer {
    /// Creates an idle indexer with no sink attached
    pub fn new(
        subscription: Subscription,
        source: Arc<dyn LogSource>,
        limiter: Arc<RateLimiter>,
        checkpoints: CheckpointLog,
        settings: IndexerSettings,
    ) -> Self {
        let (state, _) = watch::channel(IndexerState::Idle);
        Self {
            subscription,
            source,
            limiter,
            checkpoints,
            settings,
            sink: None,
            state,
        }
    }

    /// The subscription being indexed
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Routes events to `sink`, replacing any previous sink
    pub fn attach(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    /// Whether a sink is attached
    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Current lifecycle state
    pub fn state(&self) -> IndexerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn state_watcher(&self) -> watch::Receiver<IndexerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: IndexerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(
                event = %self.subscription.event,
                from = %previous,
                to = %state,
                "Indexer state changed"
            );
        }
    }

    fn attached_sink(&self) -> Result<Arc<dyn EventSink>, IndexerError> {
        self.sink.clone().ok_or_else(|| IndexerError::NotAttached {
            event: self.subscription.event.clone(),
        })
    }

    /// Cursor to resume from, or `None` to skip straight to live delivery
    ///
    /// A numeric start block acts as a floor under the checkpoint.
    pub async fn resume_cursor(&self) -> Result<Option<Cursor>, IndexerError> {
        let checkpoint = self.checkpoints.newest().await?;
        let cursor = match (checkpoint, self.subscription.start_block) {
            (Some(checkpoint), StartBlock::Number(floor)) => Some(checkpoint.max(Cursor::at(floor))),
            (None, StartBlock::Number(floor)) => Some(Cursor::at(floor)),
            (checkpoint, StartBlock::Latest) => checkpoint,
        };

        debug!(
            event = %self.subscription.event,
            start_block = %self.subscription.start_block,
            checkpoint = ?checkpoint,
            resume = ?cursor,
            "Computed resume point"
        );
        Ok(cursor)
    }

    /// Backfills from the resume point up to the current head, without going live
    ///
    /// Returns the cursor reached. With a `Latest` start and no checkpoint
    /// nothing is imported and the cursor sits just past the head.
    pub async fn catch_up(&self) -> Result<Cursor, IndexerError> {
        let sink = self.attached_sink()?;
        match self.resume_cursor().await? {
            Some(cursor) => {
                self.set_state(IndexerState::Importing);
                self.backfill(sink.as_ref(), cursor).await
            }
            None => self.cursor_past_head().await,
        }
    }

    /// Runs the indexer until a fatal error
    ///
    /// Transient source failures are retried per the retry policy and never
    /// end the run while retries remain.
    pub async fn run(self) -> Result<(), IndexerError> {
        let span = spans::indexer_run(
            &self.subscription.id,
            &self.subscription.event,
            &self.subscription.artifact.canonical(),
        );

        async {
            let sink = self.attached_sink()?;
            let cursor = self.catch_up().await?;
            self.follow(sink.as_ref(), cursor).await
        }
        .instrument(span)
        .await
    }

    /// Runs the indexer as an independent task
    pub fn spawn(self) -> JoinHandle<Result<(), IndexerError>> {
        tokio::spawn(self.run())
    }

    async fn head(&self) -> Result<u64, IndexerError> {
        with_retry(&self.limiter, &self.settings.retry, "head", || self.source.head()).await
    }

    async fn cursor_past_head(&self) -> Result<Cursor, IndexerError> {
        let head = self.head().await?;
        info!(
            event = %self.subscription.event,
            head = head,
            "No checkpoint and latest start, skipping backfill"
        );
        Ok(Cursor::after_block(head))
    }

    /// Imports ranges until the cursor passes the head
    async fn backfill(&self, sink: &dyn EventSink, mut cursor: Cursor) -> Result<Cursor, IndexerError> {
        loop {
            let head = self.head().await?;
            if cursor.next_block > head {
                debug!(
                    event = %self.subscription.event,
                    head = head,
                    cursor = %cursor,
                    "Backfill reached head"
                );
                return Ok(cursor);
            }

            let from = cursor.next_block;
            let to = self.settings.batch.range_end(from, head);
            cursor = self
                .import_range(sink, cursor, from, to)
                .instrument(spans::backfill_range(&self.subscription.event, from, to))
                .await?;
        }
    }

    async fn import_range(
        &self,
        sink: &dyn EventSink,
        mut cursor: Cursor,
        from: u64,
        to: u64,
    ) -> Result<Cursor, IndexerError> {
        let operation = format!("query {} {from}-{to}", self.subscription.event);
        let events = with_retry(&self.limiter, &self.settings.retry, &operation, || {
            self.source.query(&self.subscription, from, to)
        })
        .await?;

        let fetched = events.len();
        let mut ordinals = BlockOrdinals::default();
        let mut processed = 0usize;
        for raw in events {
            let Some(event) = self.validate(raw, &mut ordinals) else {
                continue;
            };
            if self.deliver(sink, &mut cursor, event).await? {
                processed += 1;
            }
        }

        sink.on_block(to).await?;
        cursor = cursor.max(Cursor::after_block(to));
        self.checkpoints.advance(cursor).await?;

        info!(
            event = %self.subscription.event,
            from_block = from,
            to_block = to,
            fetched = fetched,
            processed = processed,
            "Imported block range"
        );
        Ok(cursor)
    }

    /// Follows the live stream forever, resubscribing when it ends
    async fn follow(&self, sink: &dyn EventSink, mut cursor: Cursor) -> Result<(), IndexerError> {
        let mut attempt = 0u32;
        loop {
            let mut stream = with_retry(&self.limiter, &self.settings.retry, "subscribe", || {
                self.source.subscribe(&self.subscription)
            })
            .await?;

            let live = async {
                cursor = self.backfill(sink, cursor).await?;
                self.set_state(IndexerState::LiveSubscribed);

                let mut ordinals = BlockOrdinals::default();
                let mut delivered = 0usize;
                while let Some(raw) = stream.next().await {
                    let Some(event) = self.validate(raw, &mut ordinals) else {
                        continue;
                    };
                    if self.deliver(sink, &mut cursor, event).await? {
                        delivered += 1;
                    }
                }
                Ok::<_, IndexerError>(delivered)
            }
            .instrument(spans::live_subscription(&self.subscription.event, attempt))
            .await?;

            if live > 0 {
                attempt = 0;
            }
            let delay = self.settings.retry.delay_for(attempt);
            warn!(
                event = %self.subscription.event,
                cursor = %cursor,
                delivered = live,
                delay_ms = delay.as_millis() as u64,
                "Live stream ended, resubscribing"
            );
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Drops events the pipeline cannot place
    fn validate(&self, raw: SourceEvent, ordinals: &mut BlockOrdinals) -> Option<IndexedEvent> {
        if raw.removed {
            warn!(
                event = %self.subscription.event,
                block_number = ?raw.block_number,
                log_index = ?raw.log_index,
                "Skipping event removed by reorg"
            );
            return None;
        }
        let Some(block_number) = raw.block_number else {
            warn!(
                event = %self.subscription.event,
                transaction_hash = ?raw.transaction_hash,
                "Skipping event without block number"
            );
            return None;
        };

        let index_in_block = ordinals.next(block_number);
        Some(IndexedEvent {
            event: self.subscription.event.clone(),
            block_number,
            log_index: raw.log_index.unwrap_or(u64::from(index_in_block)),
            index_in_block,
            transaction_hash: raw.transaction_hash,
            args: raw.args,
        })
    }

    /// Hands `event` to the sink and checkpoints it, unless already covered
    ///
    /// Returns whether the event was delivered.
    async fn deliver(
        &self,
        sink: &dyn EventSink,
        cursor: &mut Cursor,
        event: IndexedEvent,
    ) -> Result<bool, IndexerError> {
        if cursor.covers(event.block_number, event.index_in_block) {
            trace!(
                event = %self.subscription.event,
                block_number = event.block_number,
                index_in_block = event.index_in_block,
                "Skipping already processed event"
            );
            return Ok(false);
        }

        sink.on_event(&event).await?;
        *cursor = Cursor::after_event(event.block_number, event.index_in_block);
        self.checkpoints.advance(*cursor).await?;
        Ok(true)
    }
}
