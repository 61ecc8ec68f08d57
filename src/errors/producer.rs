// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use super::StoreError;

/// Errors from a [`Producer`](crate::Producer).
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// Persisting aggregates or producer state failed.
    #[error("Producer store failed: {0}")]
    Store(#[from] StoreError),

    /// A record arrived for a block other than the one being accumulated.
    ///
    /// Block boundaries are announced through `save_block`; a record from a
    /// later block means a boundary was skipped.
    #[error("{producer} received a record for block {received} while accumulating block {current:?}")]
    OutOfOrder {
        /// Producer name
        producer: String,
        /// Block being accumulated, if any
        current: Option<u64>,
        /// Block of the offending record
        received: u64,
    },
}
