// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Indexing progress checkpoints
//!
//! A subscription's checkpoints live in one ordered namespace keyed by block
//! number. Each entry is either
//!
//! - **sealed**: the keyed block and everything before it are processed, or
//! - **unsealed**: events of the keyed block up to and including
//!   `event_index` are processed.
//!
//! The newest entry alone determines where indexing resumes.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{OrderedLog, OrderedStore};
use crate::errors::StoreError;

/// Persisted checkpoint value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Process that wrote the checkpoint
    pub writer_id: String,
    /// Index within the keyed block of the last processed event
    pub event_index: u32,
    /// Whether the keyed block is complete
    pub sealed: bool,
}

/// Resume position of a subscription
///
/// Ordered by progress: `Cursor { next_block: 7, partial: Some(2) }` is ahead
/// of `Cursor { next_block: 7, partial: None }` and behind
/// `Cursor { next_block: 8, partial: None }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// First block not known to be complete
    pub next_block: u64,
    /// Index of the last processed event within `next_block`, if any
    pub partial: Option<u32>,
}

impl Cursor {
    /// Cursor at the start of `block`
    pub const fn at(block: u64) -> Self {
        Self {
            next_block: block,
            partial: None,
        }
    }

    /// Cursor after event `index` of `block`
    pub const fn after_event(block: u64, index: u32) -> Self {
        Self {
            next_block: block,
            partial: Some(index),
        }
    }

    /// Cursor after all of `block`
    pub const fn after_block(block: u64) -> Self {
        Self::at(block.saturating_add(1))
    }

    /// Whether the event at `(block, index)` has already been processed
    ///
    /// ```rust
    /// use eventfold::store::Cursor;
    ///
    /// let cursor = Cursor::after_event(10, 1);
    /// assert!(cursor.covers(9, 40));
    /// assert!(cursor.covers(10, 1));
    /// assert!(!cursor.covers(10, 2));
    /// assert!(!cursor.covers(11, 0));
    /// ```
    pub fn covers(&self, block: u64, index: u32) -> bool {
        block < self.next_block
            || (block == self.next_block && self.partial.is_some_and(|p| index <= p))
    }

    fn progress(&self) -> (u64, u64) {
        (
            self.next_block,
            self.partial.map_or(0, |i| u64::from(i) + 1),
        )
    }

    fn from_entry(key: u64, checkpoint: &Checkpoint) -> Self {
        if checkpoint.sealed {
            Self::after_block(key)
        } else {
            Self::after_event(key, checkpoint.event_index)
        }
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.progress().cmp(&other.progress())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.partial {
            Some(index) => write!(f, "block {} after event {index}", self.next_block),
            None => write!(f, "start of block {}", self.next_block),
        }
    }
}

/// Append-only checkpoint line of one subscription
///
/// Writes that would move the cursor backwards are rejected with
/// [`StoreError::CheckpointRegression`]; writing the current cursor again is
/// allowed.
#[derive(Debug, Clone)]
pub struct CheckpointLog {
    subscription: String,
    writer_id: String,
    log: OrderedLog<Checkpoint>,
}

impl CheckpointLog {
    /// Checkpoint line for `subscription`, stamping writes with `writer_id`
    pub fn new(
        store: Arc<dyn OrderedStore>,
        subscription: impl Into<String>,
        writer_id: impl Into<String>,
    ) -> Self {
        Self {
            subscription: subscription.into(),
            writer_id: writer_id.into(),
            log: OrderedLog::new(store),
        }
    }

    /// Cursor implied by the newest checkpoint
    pub async fn newest(&self) -> Result<Option<Cursor>, StoreError> {
        Ok(self
            .log
            .newest()
            .await?
            .map(|(key, checkpoint)| Cursor::from_entry(key, &checkpoint)))
    }

    /// Raw checkpoint stored at or below `block`
    pub async fn at_or_below(&self, block: u64) -> Result<Option<(u64, Checkpoint)>, StoreError> {
        self.log.at_or_below(block).await
    }

    /// Persist `cursor`
    ///
    /// The start of block zero is implied and never written.
    pub async fn advance(&self, cursor: Cursor) -> Result<(), StoreError> {
        if let Some(current) = self.newest().await? {
            if cursor < current {
                return Err(StoreError::CheckpointRegression {
                    subscription: self.subscription.clone(),
                    current: current.to_string(),
                    attempted: cursor.to_string(),
                });
            }
        }

        let (key, checkpoint) = match cursor.partial {
            Some(index) => (
                cursor.next_block,
                Checkpoint {
                    writer_id: self.writer_id.clone(),
                    event_index: index,
                    sealed: false,
                },
            ),
            None if cursor.next_block == 0 => return Ok(()),
            None => (
                cursor.next_block - 1,
                Checkpoint {
                    writer_id: self.writer_id.clone(),
                    event_index: 0,
                    sealed: true,
                },
            ),
        };

        trace!(
            subscription = %self.subscription,
            block = key,
            event_index = checkpoint.event_index,
            sealed = checkpoint.sealed,
            "Writing checkpoint"
        );
        self.log.put(key, &checkpoint).await
    }
}
