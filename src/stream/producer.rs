//! Payment producer
//!
//! Serializes card payloads to JSON and appends them to the payment topic,
//! keyed by card number so that each card's payments stay in order.

use std::sync::Arc;

use tracing::debug;

use super::topic::{PartitionedTopic, RecordPosition};
use crate::types::{CardPayload, LedgerError};

/// Publishes card payloads to a topic
#[derive(Debug, Clone)]
pub struct EventProducer {
    topic: Arc<PartitionedTopic>,
}

impl EventProducer {
    pub fn new(topic: Arc<PartitionedTopic>) -> Self {
        Self { topic }
    }

    pub fn topic(&self) -> &Arc<PartitionedTopic> {
        &self.topic
    }

    /// Publish a payload keyed by its card number
    ///
    /// # Returns
    ///
    /// The topic, partition and offset the record was appended at.
    pub fn publish(&self, payload: &CardPayload) -> Result<RecordPosition, LedgerError> {
        let value = serde_json::to_string(payload)?;
        let position = self.topic.append(&payload.card_number, value);
        debug!(
            topic = %position.topic,
            partition = position.partition,
            offset = position.offset,
            "payload published"
        );
        Ok(position)
    }
}
