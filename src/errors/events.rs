// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for event processing.
//!
//! These are raised by event processors while turning an
//! [`IndexedEvent`](crate::IndexedEvent) into a domain record.

use super::TagError;

/// Errors that can occur while decoding a single event.
///
/// Decode failures are isolated to the event that caused them: the connector
/// logs the failure and moves on to the next event (see
/// [`is_skippable`](Self::is_skippable)).
///
/// # Examples
///
/// ```rust
/// use eventfold::EventProcessingError;
///
/// let error = EventProcessingError::missing_field("Transfer", "value");
/// assert!(error.is_skippable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EventProcessingError {
    /// An argument had the wrong shape for the event being decoded.
    #[error("Failed to decode event: {details}")]
    DecodeFailed {
        /// Details about why the decode failed
        details: String,
    },

    /// An expected positional argument was absent.
    #[error("Event {event} is missing field {field}")]
    MissingField {
        /// Event name
        event: String,
        /// Name of the missing field
        field: String,
    },

    /// Compressing an address into a tag failed.
    ///
    /// This is a store failure rather than a malformed event, so it is not
    /// skipped.
    #[error("Tagging failed: {0}")]
    Tag(#[from] TagError),
}

impl EventProcessingError {
    /// Create a `DecodeFailed` error with details.
    pub fn decode_failed(details: impl Into<String>) -> Self {
        EventProcessingError::DecodeFailed {
            details: details.into(),
        }
    }

    /// Create a `MissingField` error.
    pub fn missing_field(event: impl Into<String>, field: impl Into<String>) -> Self {
        EventProcessingError::MissingField {
            event: event.into(),
            field: field.into(),
        }
    }

    /// Whether the event should be logged and skipped instead of failing the
    /// surrounding batch.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            EventProcessingError::DecodeFailed { .. } | EventProcessingError::MissingField { .. }
        )
    }
}
