//! Tracing span helpers for eventfold operations.
//!
//! Span construction lives here rather than in `#[instrument]` attributes so
//! that telemetry stays out of the indexing and aggregation logic. Futures are
//! wrapped with [`tracing::Instrument`]:
//!
//! ```rust,ignore
//! use tracing::Instrument;
//!
//! self.backfill(cursor)
//!     .instrument(spans::backfill_range(&self.subscription.event, from, to))
//!     .await?;
//! ```

use alloy_primitives::BlockNumber;
use tracing::{Level, Span};

use crate::indexer::SubscriptionId;

/// Create span for the whole lifetime of one indexer task.
///
/// Parent: None (root span for the subscription)
/// Children: backfill_range, live_subscription
#[inline]
pub(crate) fn indexer_run(id: &SubscriptionId, event: &str, artifact: &str) -> Span {
    tracing::span!(
        Level::INFO,
        "eventfold.indexer_run",
        subscription_id = %id,
        event = event,
        artifact = artifact,
    )
}

/// Create span for fetching and processing one backfill batch.
///
/// Parent: indexer_run
/// Children: dispatch_event spans (one per event)
#[inline]
pub(crate) fn backfill_range(event: &str, from_block: BlockNumber, to_block: BlockNumber) -> Span {
    tracing::debug_span!(
        "eventfold.backfill_range",
        event = event,
        from_block = from_block,
        to_block = to_block,
    )
}

/// Create span for one live subscription, from subscribe until the stream ends.
///
/// Parent: indexer_run
#[inline]
pub(crate) fn live_subscription(event: &str, attempt: u32) -> Span {
    tracing::info_span!("eventfold.live_subscription", event = event, attempt = attempt)
}

/// Create span for routing one event through processor, producers and post-processor.
#[inline]
pub(crate) fn dispatch_event(event: &str, block_number: BlockNumber, log_index: u64) -> Span {
    tracing::trace_span!(
        "eventfold.dispatch_event",
        event = event,
        block_number = block_number,
        log_index = log_index,
    )
}

/// Create span for flushing a producer's accumulators at a block boundary.
#[inline]
pub(crate) fn producer_flush(producer: &str, block_number: BlockNumber) -> Span {
    tracing::debug_span!(
        "eventfold.producer_flush",
        producer = producer,
        block_number = block_number,
    )
}
