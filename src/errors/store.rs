// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the durable store.

use std::path::PathBuf;

/// Errors raised by [`Store`](crate::store::Store) backends and the typed
/// logs built on top of them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system operation failed.
    #[error("Store I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A value could not be (de)serialized.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A checkpoint write would move a subscription's cursor backwards.
    #[error(
        "Checkpoint regression for subscription {subscription}: {attempted} is behind {current}"
    )]
    CheckpointRegression {
        /// Subscription id
        subscription: String,
        /// Cursor currently persisted
        current: String,
        /// Cursor that was rejected
        attempted: String,
    },

    /// The store was closed.
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Create an `Io` error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
