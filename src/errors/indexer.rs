// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use super::{ConnectorError, RpcError, StoreError};

/// Errors that stop an [`EventIndexer`](crate::EventIndexer).
///
/// Transient source failures never surface here while retries remain; only
/// an exhausted retry budget does.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// A source call kept failing until the retry budget ran out.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// What was being attempted
        operation: String,
        /// How many attempts were made
        attempts: u32,
        /// The last error
        #[source]
        source: RpcError,
    },

    /// Reading or writing checkpoints failed.
    #[error("Checkpoint store failed: {0}")]
    Store(#[from] StoreError),

    /// The connector callback failed.
    #[error("Event sink failed: {0}")]
    Sink(#[from] ConnectorError),

    /// The indexer was started without a sink.
    #[error("Indexer for {event} has no event sink attached")]
    NotAttached {
        /// Event name
        event: String,
    },

    /// The indexer task panicked or was cancelled.
    #[error("Indexer task for {event} ended abnormally: {details}")]
    TaskFailed {
        /// Event name
        event: String,
        /// Join error text
        details: String,
    },
}
