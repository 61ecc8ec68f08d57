// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use super::{ArtifactParseError, StoreError};

/// Errors from [`ArtifactResolver`](crate::ArtifactResolver).
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// No reverse mapping has been persisted for the tag.
    #[error("No artifact recorded for tag {tag}")]
    NotFound {
        /// Tag that was looked up, in hex
        tag: String,
    },

    /// The persisted canonical string no longer parses.
    #[error("Stored artifact is not parseable: {0}")]
    Parse(#[from] ArtifactParseError),

    /// The tag store failed.
    #[error("Tag store failed: {0}")]
    Store(#[from] StoreError),
}
