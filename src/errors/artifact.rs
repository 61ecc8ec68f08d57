// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

/// Errors from parsing a [`ChainArtifact`](crate::ChainArtifact) identifier.
///
/// # Examples
///
/// ```rust
/// use eventfold::{ArtifactParseError, ChainArtifact};
///
/// let err = "cosmos:cosmoshub-4".parse::<ChainArtifact>().unwrap_err();
/// assert!(matches!(err, ArtifactParseError::UnsupportedNamespace { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactParseError {
    /// Only `eip155` chains are supported.
    #[error("Unsupported chain namespace: {namespace}")]
    UnsupportedNamespace {
        /// The namespace found in the identifier
        namespace: String,
    },

    /// The identifier does not follow `namespace:reference[...]`.
    #[error("Malformed artifact identifier '{input}': {reason}")]
    Malformed {
        /// The identifier that failed to parse
        input: String,
        /// Why it failed
        reason: String,
    },
}

impl ArtifactParseError {
    pub(crate) fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ArtifactParseError::Malformed {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
