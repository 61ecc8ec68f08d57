// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the eventfold library.
//!
//! Like the rest of the crate, errors follow a hybrid approach:
//!
//! - **Module-specific errors** for fine-grained handling ([`IndexerError`],
//!   [`ConnectorError`], [`StoreError`], ...)
//! - **Unified error type** ([`EventfoldError`]) for callers that only need to
//!   propagate failures
//!
//! # Failure classes
//!
//! | Class | Type | Handling |
//! |-------|------|----------|
//! | Configuration / duplicate registration | [`ConnectorError`] | fatal at setup |
//! | Transient network | [`RpcError`] | retried with backoff by the indexer |
//! | Malformed event | [`EventProcessingError`] | logged, event skipped |
//! | Tag lookup miss | [`TagError::NotFound`] | returned to the caller |
//! | Durable store | [`StoreError`] | fatal to the owning task |
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventfold::{ConnectorError, EventfoldError};
//!
//! async fn setup(connector: &mut Connector<TokenRecord>) -> Result<(), EventfoldError> {
//!     match connector.init().await {
//!         Err(ConnectorError::Configuration { details }) => {
//!             eprintln!("bad wiring: {details}");
//!         }
//!         other => other?,
//!     }
//!     Ok(())
//! }
//! ```

mod artifact;
mod connector;
mod events;
mod indexer;
mod producer;
mod rpc;
mod store;
mod tag;

pub use artifact::ArtifactParseError;
pub use connector::ConnectorError;
pub use events::EventProcessingError;
pub use indexer::IndexerError;
pub use producer::ProducerError;
pub use rpc::RpcError;
pub use store::StoreError;
pub use tag::TagError;

/// Unified error type for all eventfold operations.
///
/// Every module-specific error converts into `EventfoldError` via `From`, so
/// `?` works across module boundaries.
#[derive(Debug, thiserror::Error)]
pub enum EventfoldError {
    /// Error from wiring or running a connector.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Error from an event indexer task.
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    /// Error from decoding a single event.
    #[error("Event processing error: {0}")]
    Events(#[from] EventProcessingError),

    /// Error from a producer.
    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    /// Error from the durable store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from tagging or resolving an artifact.
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// Error from parsing an artifact identifier.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactParseError),

    /// Error from the chain log source.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}
