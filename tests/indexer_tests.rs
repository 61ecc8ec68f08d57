// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for EventIndexer backfill, resume and live hand-off

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use eventfold::source::LogSource;
use eventfold::store::{CheckpointLog, Cursor, MemoryStore, Store};
use eventfold::{
    EventFilter, EventIndexer, IndexerError, IndexerSettings, IndexerState, MaxBlockRange,
    RateLimiter, RetryPolicy, StartBlock, Subscription,
};
use helpers::{init_tracing, token, transfer, MockLogSource, RecordingSink, ALICE, BOB};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: None,
    }
}

fn subscription(start: StartBlock) -> Subscription {
    Subscription::new(token(), "Transfer", EventFilter::any(), start)
}

fn checkpoints(store: &MemoryStore, subscription: &Subscription) -> CheckpointLog {
    CheckpointLog::new(
        store.ordered(&subscription.checkpoint_namespace()),
        subscription.id.to_string(),
        "test-writer",
    )
}

fn indexer(
    store: &MemoryStore,
    source: &Arc<MockLogSource>,
    start: StartBlock,
    batch: u64,
) -> (EventIndexer, Arc<RecordingSink>) {
    let subscription = subscription(start);
    let mut indexer = EventIndexer::new(
        subscription.clone(),
        Arc::clone(source) as Arc<dyn LogSource>,
        Arc::new(RateLimiter::unlimited()),
        checkpoints(store, &subscription),
        IndexerSettings {
            batch: MaxBlockRange::new(batch),
            retry: fast_retry(),
        },
    );
    let sink = Arc::new(RecordingSink::default());
    indexer.attach(sink.clone());
    (indexer, sink)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_backfill_walks_fixed_ranges_to_head() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(25));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 10);

    let cursor = indexer.catch_up().await.unwrap();

    assert_eq!(source.queries(), vec![(0, 9), (10, 19), (20, 25)]);
    assert_eq!(*sink.blocks.lock().unwrap(), vec![9, 19, 25]);
    assert_eq!(cursor, Cursor::at(26));
    assert_eq!(indexer.state(), IndexerState::Importing);

    // Empty ranges still leave a sealed checkpoint
    let sub = subscription(StartBlock::Number(0));
    assert_eq!(checkpoints(&store, &sub).newest().await.unwrap(), Some(Cursor::at(26)));
}

#[tokio::test]
async fn test_events_arrive_in_order_with_block_positions() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(20).with_events(vec![
        transfer(12, 7, BOB, ALICE, 3),
        transfer(5, 2, Address::ZERO, ALICE, 1),
        transfer(12, 3, ALICE, BOB, 2),
    ]));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 100);

    indexer.catch_up().await.unwrap();

    let events = sink.events.lock().unwrap().clone();
    let positions: Vec<_> = events
        .iter()
        .map(|e| (e.block_number, e.log_index, e.index_in_block))
        .collect();
    assert_eq!(positions, vec![(5, 2, 0), (12, 3, 0), (12, 7, 1)]);
    assert!(events.iter().all(|e| e.event == "Transfer"));
}

#[tokio::test]
async fn test_resume_skips_events_covered_by_checkpoint() {
    let store = MemoryStore::new();
    let sub = subscription(StartBlock::Number(0));
    checkpoints(&store, &sub)
        .advance(Cursor::after_event(10, 0))
        .await
        .unwrap();

    let source = Arc::new(MockLogSource::new(15).with_events(vec![
        transfer(8, 0, ALICE, BOB, 1),
        transfer(10, 0, ALICE, BOB, 1),
        transfer(10, 1, ALICE, BOB, 1),
        transfer(11, 0, ALICE, BOB, 1),
    ]));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 100);

    indexer.catch_up().await.unwrap();

    assert_eq!(source.queries(), vec![(10, 15)]);
    assert_eq!(sink.positions(), vec![(10, 1), (11, 0)]);
}

#[tokio::test]
async fn test_start_block_is_a_floor_under_the_checkpoint() {
    let store = MemoryStore::new();
    let sub = subscription(StartBlock::Number(20));
    checkpoints(&store, &sub).advance(Cursor::at(6)).await.unwrap();

    let source = Arc::new(MockLogSource::new(30));
    let (indexer, _sink) = indexer(&store, &source, StartBlock::Number(20), 100);

    assert_eq!(indexer.resume_cursor().await.unwrap(), Some(Cursor::at(20)));
    indexer.catch_up().await.unwrap();
    assert_eq!(source.queries(), vec![(20, 30)]);
}

#[tokio::test]
async fn test_latest_without_checkpoint_skips_backfill() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(1_000).with_events(vec![transfer(
        999, 0, ALICE, BOB, 1,
    )]));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Latest, 100);

    assert_eq!(indexer.resume_cursor().await.unwrap(), None);
    let cursor = indexer.catch_up().await.unwrap();

    assert_eq!(cursor, Cursor::at(1_001));
    assert!(source.queries().is_empty());
    assert!(sink.positions().is_empty());
}

#[tokio::test]
async fn test_latest_with_checkpoint_resumes() {
    let store = MemoryStore::new();
    let sub = subscription(StartBlock::Latest);
    checkpoints(&store, &sub).advance(Cursor::at(50)).await.unwrap();

    let source = Arc::new(MockLogSource::new(60));
    let (indexer, _sink) = indexer(&store, &source, StartBlock::Latest, 100);

    indexer.catch_up().await.unwrap();
    assert_eq!(source.queries(), vec![(50, 60)]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_query_failures_are_retried() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(9).with_events(vec![transfer(3, 0, ALICE, BOB, 1)]));
    source.fail_next_queries(2);
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 10);

    indexer.catch_up().await.unwrap();

    assert_eq!(source.queries(), vec![(0, 9), (0, 9), (0, 9)]);
    assert_eq!(sink.positions(), vec![(3, 0)]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_leave_checkpoint_untouched() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(9).with_events(vec![transfer(3, 0, ALICE, BOB, 1)]));
    source.fail_next_queries(10);

    let sub = subscription(StartBlock::Number(0));
    let mut indexer = EventIndexer::new(
        sub.clone(),
        Arc::clone(&source) as Arc<dyn LogSource>,
        Arc::new(RateLimiter::unlimited()),
        checkpoints(&store, &sub),
        IndexerSettings {
            batch: MaxBlockRange::new(10),
            retry: RetryPolicy::bounded(2),
        },
    );
    indexer.attach(Arc::new(RecordingSink::default()));

    let err = indexer.catch_up().await.unwrap_err();

    assert!(matches!(err, IndexerError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(checkpoints(&store, &sub).newest().await.unwrap(), None);
}

#[tokio::test]
async fn test_removed_and_blockless_events_are_skipped() {
    let store = MemoryStore::new();
    let mut removed = transfer(4, 0, ALICE, BOB, 1);
    removed.removed = true;
    let mut pending = transfer(4, 1, ALICE, BOB, 1);
    pending.block_number = None;

    let source = Arc::new(MockLogSource::new(9).with_events(vec![
        removed,
        pending,
        transfer(4, 2, ALICE, BOB, 1),
    ]));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 10);

    indexer.catch_up().await.unwrap();

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!((events[0].log_index, events[0].index_in_block), (2, 0));
}

#[tokio::test]
async fn test_identical_subscriptions_share_checkpoint_line() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(40));

    let (first, _) = indexer(&store, &source, StartBlock::Number(0), 100);
    first.catch_up().await.unwrap();

    let (second, _) = indexer(&store, &source, StartBlock::Number(0), 100);
    assert_eq!(first.subscription().id, second.subscription().id);
    assert_eq!(second.resume_cursor().await.unwrap(), Some(Cursor::at(41)));
}

#[tokio::test]
async fn test_unattached_indexer_refuses_to_run() {
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(1));
    let sub = subscription(StartBlock::Number(0));
    let indexer = EventIndexer::new(
        sub.clone(),
        source as Arc<dyn LogSource>,
        Arc::new(RateLimiter::unlimited()),
        checkpoints(&store, &sub),
        IndexerSettings::default(),
    );

    assert!(matches!(
        indexer.run().await,
        Err(IndexerError::NotAttached { .. })
    ));
}

#[tokio::test]
async fn test_live_handoff_dedupes_and_resubscribes() {
    init_tracing();
    let store = MemoryStore::new();
    let source = Arc::new(MockLogSource::new(25).with_events(vec![transfer(20, 0, ALICE, BOB, 1)]));
    let (indexer, sink) = indexer(&store, &source, StartBlock::Number(0), 10);
    let mut state = indexer.state_watcher();
    let handle = indexer.spawn();

    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == IndexerState::LiveSubscribed),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(source.subscriptions(), 1);
    assert_eq!(sink.positions(), vec![(20, 0)]);

    // A replay of a backfilled event is dropped, a new one is delivered
    assert!(source.push_live(transfer(20, 0, ALICE, BOB, 1)));
    assert!(source.push_live(transfer(30, 4, BOB, ALICE, 2)));
    wait_until(|| sink.positions().len() == 2).await;
    assert_eq!(sink.positions(), vec![(20, 0), (30, 4)]);

    // Events that land while the stream is down are caught up after resubscribing
    source.push_events(vec![transfer(31, 0, ALICE, BOB, 5)]);
    source.set_head(31);
    source.end_live();
    wait_until(|| source.subscriptions() == 2 && sink.positions().len() == 3).await;
    assert_eq!(sink.positions(), vec![(20, 0), (30, 4), (31, 0)]);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let sub = subscription(StartBlock::Number(0));
    assert_eq!(checkpoints(&store, &sub).newest().await.unwrap(), Some(Cursor::at(32)));
}
