//! Shared state of the HTTP handlers
//!
//! Components are built once at start-up and handed to the router here; the
//! same pipeline instance is shared with the consumer pool.

use std::sync::Arc;

use crate::core::{LedgerPipeline, LedgerQueries, LedgerStore, Registry};
use crate::stream::EventProducer;

/// Components reachable from every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<LedgerPipeline>,
    pub registry: Registry,
    pub queries: LedgerQueries,
    pub producer: EventProducer,
}

impl AppState {
    /// Build the state around an existing pipeline
    ///
    /// Registry and queries read and write the pipeline's store.
    pub fn new(pipeline: Arc<LedgerPipeline>, producer: EventProducer) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::clone(pipeline.store());
        Self {
            registry: Registry::new(Arc::clone(&store)),
            queries: LedgerQueries::new(store),
            pipeline,
            producer,
        }
    }
}
