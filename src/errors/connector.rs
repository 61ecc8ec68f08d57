// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for connector wiring and dispatch.

use super::{EventProcessingError, ProducerError, TagError};

/// Errors that can occur while wiring or running a
/// [`Connector`](crate::Connector).
///
/// Setup errors ([`Configuration`](Self::Configuration),
/// [`DuplicateRegistration`](Self::DuplicateRegistration)) are meant to abort
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The connector is wired inconsistently.
    #[error("Configuration error: {details}")]
    Configuration {
        /// What is wrong
        details: String,
    },

    /// Something that must be unique per event was registered twice.
    #[error("Duplicate {kind} registration for event {event}")]
    DuplicateRegistration {
        /// What was registered ("indexer", "event processor", ...)
        kind: &'static str,
        /// Event name
        event: String,
    },

    /// `start` or dispatch was called before `init`.
    #[error("Connector has not been initialized")]
    NotInitialized,

    /// `init` was called twice, or registration happened after `init`.
    #[error("Connector is already initialized")]
    AlreadyInitialized,

    /// The owning registry has been closed.
    #[error("Registry is closed")]
    RegistryClosed,

    /// A producer failed.
    #[error("Producer failed: {0}")]
    Producer(#[from] ProducerError),

    /// An event processor failed with an error that cannot be skipped.
    #[error("Event processing failed: {0}")]
    Processing(#[from] EventProcessingError),

    /// Tagging artifacts failed.
    #[error("Tagging failed: {0}")]
    Tag(#[from] TagError),
}

impl ConnectorError {
    /// Create a `Configuration` error with details.
    pub fn configuration(details: impl Into<String>) -> Self {
        ConnectorError::Configuration {
            details: details.into(),
        }
    }

    /// Create a `DuplicateRegistration` error.
    pub fn duplicate(kind: &'static str, event: impl Into<String>) -> Self {
        ConnectorError::DuplicateRegistration {
            kind,
            event: event.into(),
        }
    }
}
