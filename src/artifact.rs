// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Chain, account and asset identifiers.
//!
//! A [`ChainArtifact`] names something on an EVM chain. Its canonical string
//! form follows the CAIP conventions and is what tags are computed from, so
//! the rendering must stay stable:
//!
//! | Artifact | Canonical form |
//! |----------|----------------|
//! | Chain | `eip155:1` |
//! | Account | `eip155:1:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48` |
//! | Asset | `eip155:1/erc20:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48` |
//!
//! Addresses are always rendered EIP-55 checksummed; parsing accepts any case.

use std::fmt;
use std::str::FromStr;

use alloy_chains::Chain;
use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::constants::{EIP155_NAMESPACE, ERC20_NAMESPACE};
use crate::errors::ArtifactParseError;

/// Identifier of a chain, an account on a chain, or an asset on a chain
///
/// # Examples
///
/// ```rust
/// use eventfold::ChainArtifact;
/// use alloy_chains::Chain;
/// use alloy_primitives::address;
///
/// let usdc = ChainArtifact::erc20(
///     Chain::mainnet(),
///     address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
/// );
/// assert_eq!(
///     usdc.to_string(),
///     "eip155:1/erc20:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
/// );
/// assert_eq!(usdc.to_string().parse::<ChainArtifact>().unwrap(), usdc);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainArtifact {
    /// A whole chain
    Chain(Chain),
    /// An externally owned account or contract
    Account {
        /// Chain the account lives on
        chain: Chain,
        /// Account address
        address: Address,
    },
    /// A token or other asset contract
    Asset {
        /// Chain the asset lives on
        chain: Chain,
        /// Asset namespace, e.g. `erc20`
        namespace: String,
        /// Contract address
        address: Address,
    },
}

impl ChainArtifact {
    /// An account artifact
    pub fn account(chain: Chain, address: Address) -> Self {
        ChainArtifact::Account { chain, address }
    }

    /// An ERC-20 asset artifact
    pub fn erc20(chain: Chain, address: Address) -> Self {
        ChainArtifact::Asset {
            chain,
            namespace: ERC20_NAMESPACE.to_string(),
            address,
        }
    }

    /// Chain the artifact belongs to
    pub fn chain(&self) -> Chain {
        match self {
            ChainArtifact::Chain(chain)
            | ChainArtifact::Account { chain, .. }
            | ChainArtifact::Asset { chain, .. } => *chain,
        }
    }

    /// Contract or account address, if the artifact has one
    pub fn address(&self) -> Option<Address> {
        match self {
            ChainArtifact::Chain(_) => None,
            ChainArtifact::Account { address, .. } | ChainArtifact::Asset { address, .. } => {
                Some(*address)
            }
        }
    }

    /// Canonical string form, the input to [`ArtifactTagger::tag`](crate::ArtifactTagger::tag)
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChainArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainArtifact::Chain(chain) => write!(f, "{EIP155_NAMESPACE}:{}", chain.id()),
            ChainArtifact::Account { chain, address } => write!(
                f,
                "{EIP155_NAMESPACE}:{}:{}",
                chain.id(),
                address.to_checksum(None)
            ),
            ChainArtifact::Asset {
                chain,
                namespace,
                address,
            } => write!(
                f,
                "{EIP155_NAMESPACE}:{}/{namespace}:{}",
                chain.id(),
                address.to_checksum(None)
            ),
        }
    }
}

impl FromStr for ChainArtifact {
    type Err = ArtifactParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = input
            .split_once(':')
            .ok_or_else(|| ArtifactParseError::malformed(input, "missing chain namespace"))?;

        if namespace != EIP155_NAMESPACE {
            return Err(ArtifactParseError::UnsupportedNamespace {
                namespace: namespace.to_string(),
            });
        }

        let parse_chain = |reference: &str| {
            reference
                .parse::<u64>()
                .map(Chain::from_id)
                .map_err(|e| ArtifactParseError::malformed(input, format!("bad chain id: {e}")))
        };
        let parse_address = |text: &str| {
            Address::from_str(text)
                .map_err(|e| ArtifactParseError::malformed(input, format!("bad address: {e}")))
        };

        if let Some((reference, asset)) = rest.split_once('/') {
            let (asset_namespace, address) = asset
                .split_once(':')
                .ok_or_else(|| ArtifactParseError::malformed(input, "missing asset reference"))?;
            if asset_namespace.is_empty() {
                return Err(ArtifactParseError::malformed(input, "empty asset namespace"));
            }
            return Ok(ChainArtifact::Asset {
                chain: parse_chain(reference)?,
                namespace: asset_namespace.to_string(),
                address: parse_address(address)?,
            });
        }

        match rest.split_once(':') {
            Some((reference, address)) => Ok(ChainArtifact::Account {
                chain: parse_chain(reference)?,
                address: parse_address(address)?,
            }),
            None => Ok(ChainArtifact::Chain(parse_chain(rest)?)),
        }
    }
}

impl Serialize for ChainArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainArtifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
