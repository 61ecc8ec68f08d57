//! Well-known addresses, namespaces and store layout constants

use alloy_primitives::Address;

/// Address that ERC-20 tokens are minted from
///
/// `Transfer(from = 0x0, ...)` is a mint by convention.
pub const MINT_ADDRESS: Address = Address::ZERO;

/// Address that ERC-20 tokens are burned to
///
/// `Transfer(..., to = 0x0, ...)` is a burn by convention.
pub const BURN_ADDRESS: Address = Address::ZERO;

/// Only chain namespace understood by [`ChainArtifact`](crate::ChainArtifact)
pub const EIP155_NAMESPACE: &str = "eip155";

/// Asset namespace used for ERC-20 tokens
pub const ERC20_NAMESPACE: &str = "erc20";

/// Store namespace layout
pub mod namespaces {
    /// Keyed namespace holding `tag -> canonical artifact`
    pub const TAGS: &str = "tags";

    /// Keyed namespace holding producer accumulator snapshots
    pub const PRODUCERS: &str = "producers";

    /// Prefix of the ordered checkpoint namespace of a subscription
    pub const CHECKPOINTS: &str = "checkpoints";

    /// Prefix of the ordered aggregate namespace of a producer
    pub const AGGREGATES: &str = "aggregates";
}
