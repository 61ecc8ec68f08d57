// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Connectors: indexers, processors and producers of one contract
//!
//! A [`Connector`] owns, per event name,
//!
//! - exactly one [`EventIndexer`]
//! - exactly one [`EventProcessor`] turning indexed events into records
//! - at most one [`PostProcessor`] for side effects
//! - any number of [`Producer`]s aggregating the records
//!
//! Wiring happens in three steps: register everything, [`init`](Connector::init)
//! (validates the wiring, restores producer state, attaches indexers), then
//! [`start`](Connector::start) (spawns one task per indexer).
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventfold::token::{TokenRecord, TransferProcessor};
//!
//! let mut connector = registry.connector::<TokenRecord>(usdc.clone(), TagMode::Resolve)?;
//! connector.add_indexer("Transfer", registry.indexer(subscription)?)?;
//! connector.add_event_processor("Transfer", Arc::new(TransferProcessor))?;
//! connector.add_producer("Transfer", Arc::new(SupplyProducer::for_token(&setup)))?;
//! connector.init().await?;
//!
//! let handle = connector.start()?;
//! handle.join().await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::artifact::ChainArtifact;
use crate::errors::{ConnectorError, EventProcessingError, IndexerError};
use crate::indexer::{EventIndexer, IndexedEvent};
use crate::producer::{Producer, ProducerRegistry, ProducerSetup};
use crate::store::Store;
use crate::tag::{ArtifactResolver, Tag, TagMode};

mod context;
mod dispatch;

pub use context::ProcessorContext;
use dispatch::{Dispatcher, EventRoute, RouteSink};

/// A decoded domain record
pub trait EventRecord: Send + Sync + 'static {
    /// Block the underlying event was emitted in
    fn block_number(&self) -> u64;

    /// Log index of the underlying event
    fn log_index(&self) -> u64;
}

/// Turns an indexed event into a domain record
///
/// Return [`EventProcessingError::DecodeFailed`] or
/// [`EventProcessingError::MissingField`] for malformed events; the connector
/// logs and skips them.
#[async_trait]
pub trait EventProcessor<R>: Send + Sync {
    /// Decodes one event
    async fn process(
        &self,
        ctx: &ProcessorContext,
        event: &IndexedEvent,
    ) -> Result<R, EventProcessingError>;
}

/// Error type of post-processors
pub type PostProcessError = Box<dyn std::error::Error + Send + Sync>;

/// Side effect run after a record reached every producer
///
/// Failures are logged and do not stop indexing.
#[async_trait]
pub trait PostProcessor<R>: Send + Sync {
    /// Handles one record of `event` emitted by `artifact`
    async fn post_process(
        &self,
        artifact: &ChainArtifact,
        event: &str,
        record: &R,
    ) -> Result<(), PostProcessError>;
}

/// Running indexer tasks of a started connector
#[derive(Debug)]
pub struct ConnectorHandle {
    tasks: Vec<(String, JoinHandle<Result<(), IndexerError>>)>,
}

impl ConnectorHandle {
    /// Events with a running task
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(event, _)| event.as_str())
    }

    /// Whether every task has ended
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|(_, task)| task.is_finished())
    }

    /// Waits for the tasks, returning the first failure as soon as it happens
    ///
    /// Indexers run until they fail, so this returns only on error or abort.
    /// A failure aborts the remaining tasks. Returns `Ok` once every task has
    /// ended cleanly.
    pub async fn join(self) -> Result<(), IndexerError> {
        let aborts: Vec<_> = self.tasks.iter().map(|(_, task)| task.abort_handle()).collect();
        let mut running: FuturesUnordered<_> = self
            .tasks
            .into_iter()
            .map(|(event, task)| async move { (event, task.await) })
            .collect();

        while let Some((event, outcome)) = running.next().await {
            let result = outcome.unwrap_or_else(|e| {
                Err(IndexerError::TaskFailed {
                    event: event.clone(),
                    details: e.to_string(),
                })
            });
            if let Err(e) = result {
                error!(event = %event, error = %e, "Indexer task failed");
                for task in &aborts {
                    task.abort();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Cancels every task
    pub fn abort(&self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

/// Orchestrates the indexers, processors and producers of one contract
pub struct Connector<R> {
    artifact: ChainArtifact,
    store: Arc<dyn Store>,
    context: ProcessorContext,
    indexers: BTreeMap<String, EventIndexer>,
    processors: HashMap<String, Arc<dyn EventProcessor<R>>>,
    post_processors: HashMap<String, Arc<dyn PostProcessor<R>>>,
    producers: HashMap<String, Vec<Arc<dyn Producer<R>>>>,
    dispatcher: Option<Arc<Dispatcher<R>>>,
}

impl<R> std::fmt::Debug for Connector<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("artifact", &self.artifact)
            .field("indexers", &self.indexers.keys().collect::<Vec<_>>())
            .field("initialized", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

impl<R> Connector<R>
where
    R: EventRecord,
{
    /// Creates an empty connector for `artifact`
    ///
    /// Tag reverse lookups go to `resolver` when `mode` is
    /// [`TagMode::Resolve`].
    pub fn new(
        artifact: ChainArtifact,
        store: Arc<dyn Store>,
        resolver: ArtifactResolver,
        mode: TagMode,
    ) -> Self {
        Self {
            context: ProcessorContext::new(artifact.clone(), mode, resolver),
            artifact,
            store,
            indexers: BTreeMap::new(),
            processors: HashMap::new(),
            post_processors: HashMap::new(),
            producers: HashMap::new(),
            dispatcher: None,
        }
    }

    /// Contract this connector serves
    pub fn artifact(&self) -> &ChainArtifact {
        &self.artifact
    }

    /// Whether [`init`](Self::init) has run
    pub fn is_initialized(&self) -> bool {
        self.dispatcher.is_some()
    }

    fn ensure_configurable(&self) -> Result<(), ConnectorError> {
        if self.is_initialized() {
            return Err(ConnectorError::AlreadyInitialized);
        }
        Ok(())
    }

    fn dispatcher(&self) -> Result<&Arc<Dispatcher<R>>, ConnectorError> {
        self.dispatcher.as_ref().ok_or(ConnectorError::NotInitialized)
    }

    /// Registers the indexer of `event`
    ///
    /// # Errors
    ///
    /// [`ConnectorError::DuplicateRegistration`] if `event` already has one.
    pub fn add_indexer(
        &mut self,
        event: impl Into<String>,
        indexer: EventIndexer,
    ) -> Result<(), ConnectorError> {
        self.ensure_configurable()?;
        let event = event.into();
        if self.indexers.contains_key(&event) {
            return Err(ConnectorError::duplicate("indexer", event));
        }
        self.indexers.insert(event, indexer);
        Ok(())
    }

    /// Registers the processor of `event`
    pub fn add_event_processor(
        &mut self,
        event: impl Into<String>,
        processor: Arc<dyn EventProcessor<R>>,
    ) -> Result<(), ConnectorError> {
        self.ensure_configurable()?;
        let event = event.into();
        if self.processors.contains_key(&event) {
            return Err(ConnectorError::duplicate("event processor", event));
        }
        self.processors.insert(event, processor);
        Ok(())
    }

    /// Registers the post-processor of `event`
    pub fn add_event_post_processor(
        &mut self,
        event: impl Into<String>,
        post_processor: Arc<dyn PostProcessor<R>>,
    ) -> Result<(), ConnectorError> {
        self.ensure_configurable()?;
        let event = event.into();
        if self.post_processors.contains_key(&event) {
            return Err(ConnectorError::duplicate("post-processor", event));
        }
        self.post_processors.insert(event, post_processor);
        Ok(())
    }

    /// Adds a producer for `event`
    pub fn add_producer(
        &mut self,
        event: impl Into<String>,
        producer: Arc<dyn Producer<R>>,
    ) -> Result<(), ConnectorError> {
        self.ensure_configurable()?;
        self.producers.entry(event.into()).or_default().push(producer);
        Ok(())
    }

    /// Adds the producer registered as `name` in `registry`
    ///
    /// # Errors
    ///
    /// [`ConnectorError::Configuration`] if `name` is not registered.
    pub fn add_named_producer(
        &mut self,
        event: impl Into<String>,
        name: &str,
        registry: &ProducerRegistry<R>,
    ) -> Result<(), ConnectorError> {
        let setup = ProducerSetup {
            store: Arc::clone(&self.store),
            artifact: self.artifact.clone(),
        };
        let producer = registry
            .build(name, &setup)
            .ok_or_else(|| ConnectorError::configuration(format!("unknown producer {name}")))?;
        self.add_producer(event, producer)
    }

    /// Validates the wiring, restores producers and attaches indexers
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::Configuration`] if an indexed event has no processor
    /// - [`ConnectorError::AlreadyInitialized`] on a second call
    /// - [`ConnectorError::Producer`] if a producer cannot restore its state
    pub async fn init(&mut self) -> Result<(), ConnectorError> {
        self.ensure_configurable()?;

        if let Some(event) = self
            .indexers
            .keys()
            .find(|event| !self.processors.contains_key(*event))
        {
            return Err(ConnectorError::configuration(format!(
                "indexer for {event} has no event processor"
            )));
        }

        for producers in self.producers.values() {
            for producer in producers {
                producer.init().await?;
            }
        }

        let routes: HashMap<String, EventRoute<R>> = self
            .processors
            .iter()
            .map(|(event, processor)| {
                let route = EventRoute::new(
                    Arc::clone(processor),
                    self.post_processors.get(event).cloned(),
                    self.producers.get(event).cloned().unwrap_or_default(),
                );
                (event.clone(), route)
            })
            .collect();
        let dispatcher = Arc::new(Dispatcher::new(self.context.clone(), routes));

        for (event, indexer) in &mut self.indexers {
            indexer.attach(Arc::new(RouteSink {
                event: event.clone(),
                dispatcher: Arc::clone(&dispatcher),
            }));
        }
        self.dispatcher = Some(dispatcher);

        info!(
            artifact = %self.artifact,
            indexers = self.indexers.len(),
            processors = self.processors.len(),
            producers = self.producers.values().map(Vec::len).sum::<usize>(),
            "Connector initialized"
        );
        Ok(())
    }

    /// Spawns every indexer as its own task
    ///
    /// Indexers move into the returned handle; calling `start` again starts
    /// nothing.
    pub fn start(&mut self) -> Result<ConnectorHandle, ConnectorError> {
        self.dispatcher()?;

        let tasks: Vec<_> = std::mem::take(&mut self.indexers)
            .into_iter()
            .map(|(event, indexer)| (event, indexer.spawn()))
            .collect();

        info!(artifact = %self.artifact, tasks = tasks.len(), "Connector started");
        Ok(ConnectorHandle { tasks })
    }

    /// Decodes one event and fans the record out
    ///
    /// Returns `None` when the event was malformed and skipped.
    pub async fn add_log(
        &self,
        event: &str,
        indexed: &IndexedEvent,
    ) -> Result<Option<R>, ConnectorError> {
        self.dispatcher()?.add_log(event, indexed).await
    }

    /// Forwards a block boundary to `event`'s producers
    ///
    /// Blocks behind the event's watermark are logged and not forwarded.
    pub async fn save_block(&self, event: &str, block: u64) -> Result<(), ConnectorError> {
        self.dispatcher()?.save_block(event, block).await?;
        Ok(())
    }

    /// Highest block forwarded to `event`'s producers
    pub async fn watermark(&self, event: &str) -> Option<u64> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.watermark(event).await,
            None => None,
        }
    }

    /// Tags `artifacts` per the connector's [`TagMode`]
    pub async fn tag_and_resolve(&self, artifacts: &[ChainArtifact]) -> Result<Vec<Tag>, ConnectorError> {
        Ok(self.context.tag_and_resolve(artifacts).await?)
    }
}
