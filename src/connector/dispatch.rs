// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-event routing from indexers to processors and producers

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn, Instrument};

use super::{EventProcessor, EventRecord, PostProcessor, ProcessorContext};
use crate::errors::ConnectorError;
use crate::indexer::{EventSink, IndexedEvent};
use crate::producer::Producer;
use crate::spans;

/// Everything registered for one event name
pub(crate) struct EventRoute<R> {
    pub(crate) processor: Arc<dyn EventProcessor<R>>,
    pub(crate) post_processor: Option<Arc<dyn PostProcessor<R>>>,
    pub(crate) producers: Vec<Arc<dyn Producer<R>>>,
    watermark: Mutex<Option<u64>>,
}

impl<R> EventRoute<R> {
    pub(crate) fn new(
        processor: Arc<dyn EventProcessor<R>>,
        post_processor: Option<Arc<dyn PostProcessor<R>>>,
        producers: Vec<Arc<dyn Producer<R>>>,
    ) -> Self {
        Self {
            processor,
            post_processor,
            producers,
            watermark: Mutex::new(None),
        }
    }
}

/// Initialised routing table of a connector
pub(crate) struct Dispatcher<R> {
    context: ProcessorContext,
    routes: HashMap<String, EventRoute<R>>,
}

impl<R> Dispatcher<R>
where
    R: EventRecord,
{
    pub(crate) fn new(context: ProcessorContext, routes: HashMap<String, EventRoute<R>>) -> Self {
        Self { context, routes }
    }

    fn route(&self, event: &str) -> Result<&EventRoute<R>, ConnectorError> {
        self.routes
            .get(event)
            .ok_or_else(|| ConnectorError::configuration(format!("no event processor for {event}")))
    }

    /// Decodes `indexed` and fans the record out
    ///
    /// Returns the record, or `None` when the event was skipped as malformed.
    pub(crate) async fn add_log(
        &self,
        event: &str,
        indexed: &IndexedEvent,
    ) -> Result<Option<R>, ConnectorError> {
        let route = self.route(event)?;

        let record = match route.processor.process(&self.context, indexed).await {
            Ok(record) => record,
            Err(e) if e.is_skippable() => {
                warn!(
                    event = event,
                    block_number = indexed.block_number,
                    log_index = indexed.log_index,
                    error = %e,
                    "Skipping event that failed to decode"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        for producer in &route.producers {
            producer.add(&record).await?;
        }

        if let Some(post) = &route.post_processor {
            if let Err(e) = post
                .post_process(self.context.artifact(), event, &record)
                .await
            {
                warn!(
                    event = event,
                    block_number = record.block_number(),
                    log_index = record.log_index(),
                    error = %e,
                    "Post-processor failed"
                );
            }
        }

        Ok(Some(record))
    }

    /// Forwards a block boundary to the event's producers
    ///
    /// Returns `false` without forwarding when `block` is behind the event's
    /// watermark.
    pub(crate) async fn save_block(&self, event: &str, block: u64) -> Result<bool, ConnectorError> {
        let route = self.route(event)?;
        let mut watermark = route.watermark.lock().await;

        if let Some(current) = *watermark {
            if block < current {
                warn!(
                    event = event,
                    watermark = current,
                    block = block,
                    "Ignoring block regression"
                );
                return Ok(false);
            }
        }

        for producer in &route.producers {
            producer.save_block(block).await?;
        }
        *watermark = Some(block);
        Ok(true)
    }

    /// Highest block forwarded for `event`
    pub(crate) async fn watermark(&self, event: &str) -> Option<u64> {
        match self.routes.get(event) {
            Some(route) => *route.watermark.lock().await,
            None => None,
        }
    }
}

/// [`EventSink`] attached to the indexer of one event
pub(crate) struct RouteSink<R> {
    pub(crate) event: String,
    pub(crate) dispatcher: Arc<Dispatcher<R>>,
}

#[async_trait]
impl<R> EventSink for RouteSink<R>
where
    R: EventRecord,
{
    async fn on_event(&self, indexed: &IndexedEvent) -> Result<(), ConnectorError> {
        let span = spans::dispatch_event(&self.event, indexed.block_number, indexed.log_index);
        async {
            if !self
                .dispatcher
                .save_block(&self.event, indexed.block_number)
                .await?
            {
                debug!(
                    event = %self.event,
                    block_number = indexed.block_number,
                    "Dropping event behind watermark"
                );
                return Ok(());
            }
            self.dispatcher.add_log(&self.event, indexed).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn on_block(&self, block: u64) -> Result<(), ConnectorError> {
        self.dispatcher.save_block(&self.event, block).await?;
        Ok(())
    }
}
