// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width content tags for artifacts.
//!
//! Event processors store [`Tag`]s instead of raw addresses. A tag is the
//! keccak-256 hash of the artifact's canonical string, so it is the same on
//! every machine and across restarts. The [`ArtifactResolver`] additionally
//! persists `tag -> canonical string` so tags can be turned back into
//! artifacts later.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::ChainArtifact;
use crate::errors::TagError;
use crate::store::KeyValueStore;

/// Keccak-256 of an artifact's canonical string
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(B256);

impl Tag {
    /// Wrap raw tag bytes
    pub const fn from_b256(bytes: B256) -> Self {
        Self(bytes)
    }

    /// Raw tag bytes
    pub const fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

/// Whether tagging persists reverse lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    /// Persist `tag -> canonical string` on first use
    #[default]
    Resolve,
    /// Compute tags only, no I/O
    TagOnly,
}

/// Pure artifact tagger
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactTagger;

impl ArtifactTagger {
    /// Tag an artifact
    ///
    /// ```rust
    /// use eventfold::{ArtifactTagger, ChainArtifact};
    /// use alloy_chains::Chain;
    ///
    /// let chain = ChainArtifact::Chain(Chain::mainnet());
    /// assert_eq!(ArtifactTagger::tag(&chain), ArtifactTagger::tag(&chain));
    /// ```
    pub fn tag(artifact: &ChainArtifact) -> Tag {
        Tag(keccak256(artifact.canonical().as_bytes()))
    }
}

/// Tags artifacts and persists their reverse mapping
///
/// `resolve` checks for an existing entry before writing, so repeated calls
/// for the same artifact write at most once. Two tasks resolving the same new
/// artifact at once may both write; the value is identical, so the race is
/// harmless.
#[derive(Clone)]
pub struct ArtifactResolver {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResolver").finish_non_exhaustive()
    }
}

impl ArtifactResolver {
    /// Create a resolver over a keyed store namespace
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Tag an artifact and record its reverse mapping if absent
    pub async fn resolve(&self, artifact: &ChainArtifact) -> Result<Tag, TagError> {
        let tag = ArtifactTagger::tag(artifact);
        let key = tag.to_string();

        if !self.store.has(&key).await? {
            self.store.put(&key, artifact.canonical()).await?;
            debug!(tag = %tag, artifact = %artifact, "Recorded artifact tag");
        }

        Ok(tag)
    }

    /// Find the artifact a tag was computed from
    ///
    /// # Errors
    ///
    /// [`TagError::NotFound`] if the tag was never resolved.
    pub async fn lookup(&self, tag: &Tag) -> Result<ChainArtifact, TagError> {
        let key = tag.to_string();
        let canonical = self
            .store
            .get(&key)
            .await?
            .ok_or(TagError::NotFound { tag: key })?;

        Ok(canonical.parse::<ChainArtifact>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use alloy_chains::Chain;
    use alloy_primitives::{address, Address};

    fn usdc() -> ChainArtifact {
        ChainArtifact::erc20(
            Chain::mainnet(),
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
        )
    }

    #[test]
    fn test_tag_is_hash_of_canonical_string() {
        let artifact = usdc();
        assert_eq!(
            ArtifactTagger::tag(&artifact),
            Tag::from_b256(keccak256(
                "eip155:1/erc20:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
            ))
        );
    }

    #[test]
    fn test_tag_distinguishes_chains() {
        let a = ChainArtifact::account(Chain::mainnet(), Address::ZERO);
        let b = ChainArtifact::account(Chain::base_mainnet(), Address::ZERO);
        assert_ne!(ArtifactTagger::tag(&a), ArtifactTagger::tag(&b));
    }

    #[tokio::test]
    async fn test_resolve_then_lookup() {
        let store = MemoryStore::new();
        let resolver = ArtifactResolver::new(store.keyed("tags"));

        let tag = resolver.resolve(&usdc()).await.unwrap();
        assert_eq!(tag, ArtifactTagger::tag(&usdc()));
        assert_eq!(resolver.lookup(&tag).await.unwrap(), usdc());
    }

    #[tokio::test]
    async fn test_lookup_unknown_tag() {
        let store = MemoryStore::new();
        let resolver = ArtifactResolver::new(store.keyed("tags"));

        let err = resolver
            .lookup(&ArtifactTagger::tag(&usdc()))
            .await
            .unwrap_err();
        assert!(matches!(err, TagError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lookup_unparseable_entry() {
        let store = MemoryStore::new();
        let keyed = store.keyed("tags");
        let tag = ArtifactTagger::tag(&usdc());
        keyed
            .put(&tag.to_string(), "cosmos:hub".to_string())
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(keyed);
        assert!(matches!(
            resolver.lookup(&tag).await,
            Err(TagError::Parse(_))
        ));
    }
}
