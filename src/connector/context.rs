// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::Address;

use crate::artifact::ChainArtifact;
use crate::errors::TagError;
use crate::tag::{ArtifactResolver, ArtifactTagger, Tag, TagMode};

/// What an event processor may use while decoding
///
/// Processors receive their collaborators here instead of holding them.
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    artifact: ChainArtifact,
    mode: TagMode,
    resolver: ArtifactResolver,
}

impl ProcessorContext {
    /// Context for processors of `artifact`'s events
    pub fn new(artifact: ChainArtifact, mode: TagMode, resolver: ArtifactResolver) -> Self {
        Self {
            artifact,
            mode,
            resolver,
        }
    }

    /// Contract whose events are processed
    pub fn artifact(&self) -> &ChainArtifact {
        &self.artifact
    }

    /// Tagging mode of the owning connector
    pub fn mode(&self) -> TagMode {
        self.mode
    }

    /// Account artifact for `address` on the contract's chain
    pub fn account(&self, address: Address) -> ChainArtifact {
        ChainArtifact::account(self.artifact.chain(), address)
    }

    /// Tags `artifacts`, recording reverse lookups in resolve mode
    ///
    /// Tags come back in input order.
    pub async fn tag_and_resolve(&self, artifacts: &[ChainArtifact]) -> Result<Vec<Tag>, TagError> {
        match self.mode {
            TagMode::TagOnly => Ok(artifacts.iter().map(ArtifactTagger::tag).collect()),
            TagMode::Resolve => {
                let mut tags = Vec::with_capacity(artifacts.len());
                for artifact in artifacts {
                    tags.push(self.resolver.resolve(artifact).await?);
                }
                Ok(tags)
            }
        }
    }
}
