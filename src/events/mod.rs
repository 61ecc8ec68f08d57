// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Event definitions and filters
//!
//! - [`definitions`]: ERC-20 `Transfer` and `Approval` events
//! - [`filter`]: positional constraints on indexed arguments

pub mod definitions;
pub mod filter;
