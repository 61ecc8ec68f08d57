// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! ERC-20 event definitions
//!
//! Typed `sol!` definitions for the events the token connector indexes, plus
//! their human-readable ABI signatures for registering with a
//! [`ProviderLogSource`](crate::source::ProviderLogSource).
//!
//! ```rust,ignore
//! use eventfold::events::definitions::{Transfer, TRANSFER_SIGNATURE};
//! use eventfold::source::ProviderLogSource;
//!
//! let source = ProviderLogSource::new(provider).with_signature(TRANSFER_SIGNATURE)?;
//! ```

use std::fmt::Debug;

use alloy_sol_types::sol;

/// ABI signature of [`Transfer`], with indexed markers
pub const TRANSFER_SIGNATURE: &str =
    "event Transfer(address indexed from, address indexed to, uint256 value)";

/// ABI signature of [`Approval`], with indexed markers
pub const APPROVAL_SIGNATURE: &str =
    "event Approval(address indexed owner, address indexed spender, uint256 value)";

sol! {
    /// ERC-20 Transfer event
    ///
    /// Mints are transfers from the zero address, burns are transfers to it.
    ///
    /// Positional arguments: `[from, to, value]`.
    event Transfer(address indexed from, address indexed to, uint256 value);
}

impl Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transfer(from: {}, to: {}, value: {})",
            self.from, self.to, self.value
        )
    }
}

sol! {
    /// ERC-20 Approval event
    ///
    /// Positional arguments: `[owner, spender, value]`.
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

impl Debug for Approval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Approval(owner: {}, spender: {}, value: {})",
            self.owner, self.spender, self.value
        )
    }
}
