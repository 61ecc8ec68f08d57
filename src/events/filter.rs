// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Constraints on indexed event arguments
//!
//! Event logs carry up to three indexed arguments as topics 1-3 (topic 0 is
//! the event selector). An [`EventFilter`] pins any of them to a value.
//!
//! ```rust
//! use eventfold::EventFilter;
//! use alloy_primitives::address;
//!
//! // Only transfers to a router
//! let filter = EventFilter::any()
//!     .with_address(2, address!("1111111111111111111111111111111111111111"));
//! assert_eq!(
//!     filter.canonical(),
//!     "t2=0x0000000000000000000000001111111111111111111111111111111111111111"
//! );
//! ```

use std::fmt;

use alloy_primitives::{Address, B256};

/// Positional constraints on topics 1-3
///
/// The canonical form is part of a subscription's identity, so two filters
/// with the same constraints always render identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventFilter {
    topics: [Option<B256>; 3],
}

impl EventFilter {
    /// Matches every log of the event
    pub const fn any() -> Self {
        Self { topics: [None; 3] }
    }

    /// Pins topic `position` (1-3) to `value`
    ///
    /// Positions outside 1-3 are ignored.
    pub fn with_topic(mut self, position: usize, value: B256) -> Self {
        if let Some(slot) = position
            .checked_sub(1)
            .and_then(|i| self.topics.get_mut(i))
        {
            *slot = Some(value);
        }
        self
    }

    /// Pins topic `position` to an address
    pub fn with_address(self, position: usize, address: Address) -> Self {
        self.with_topic(position, address.into_word())
    }

    /// Constraint on topic `position`, if any
    pub fn topic(&self, position: usize) -> Option<B256> {
        position
            .checked_sub(1)
            .and_then(|i| self.topics.get(i))
            .copied()
            .flatten()
    }

    /// `(position, value)` for every pinned topic, in position order
    pub fn constraints(&self) -> impl Iterator<Item = (usize, B256)> + '_ {
        self.topics
            .iter()
            .enumerate()
            .filter_map(|(i, topic)| topic.map(|t| (i + 1, t)))
    }

    /// Whether the filter matches every log
    pub fn is_any(&self) -> bool {
        self.topics.iter().all(Option::is_none)
    }

    /// Stable string form, `*` when unconstrained
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self
            .constraints()
            .map(|(position, value)| format!("t{position}={value}"))
            .collect();
        f.write_str(&parts.join(";"))
    }
}
