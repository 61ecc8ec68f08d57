// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Outbound call throttling.
//!
//! Every call an indexer makes to its chain log source goes through a
//! [`RateLimiter`] shared by all indexers of the same `(chain, provider)`
//! pair. [`RateLimiterRegistry`] hands out those shared instances.
//!
//! # Throttling an Alloy client
//!
//! The same limiter can sit in an Alloy transport stack, so calls made
//! outside eventfold count against the same budget:
//!
//! ```rust,ignore
//! use eventfold::transport::{RateLimitLayer, RateLimiterRegistry};
//! use alloy_rpc_client::ClientBuilder;
//! use alloy_provider::ProviderBuilder;
//!
//! let limiter = registry.get_or_create(chain, ProviderKind::Alchemy, config.get_rate_limit(chain, &ProviderKind::Alchemy));
//! let client = ClientBuilder::default()
//!     .layer(RateLimitLayer::new(limiter))
//!     .http(rpc_url);
//!
//! let provider = ProviderBuilder::new().connect_client(client);
//! ```

mod rate_limit;

pub use rate_limit::{RateLimitLayer, RateLimitService, RateLimiter, RateLimiterRegistry};
