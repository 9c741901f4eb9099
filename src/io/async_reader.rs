//! Asynchronous CSV reader over card-payment files
//!
//! Provides a batch-reading interface over the payments of a CSV file, used
//! by `ingest` to feed the payment topic.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - tokio (through the `compat` layer of tokio-util) for file access
//! - Batch reading so memory stays bounded by the batch size
//!
//! # Architecture
//!
//! ```text
//! CSV file → AsyncReader → Batches of CardPayloads → EventProducer
//!                 ↓
//!          csv_format module
//!   (PaymentCsvRecord, convert_csv_record)
//! ```

use std::path::Path;

use crate::io::csv_format::{convert_csv_record, PaymentCsvRecord};
use crate::types::{CardPayload, LedgerError};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::warn;

/// Asynchronous CSV reader
///
/// Rows that fail to parse or convert are logged and skipped.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl AsyncReader<Compat<tokio::fs::File>> {
    /// Open a payment CSV file
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to open file '{}': {}", path.display(), e),
            })?;
        Ok(Self::new(file.compat()))
    }
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read a batch of card payloads
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of payloads to read
    ///
    /// # Returns
    ///
    /// Successfully converted payloads, in file order. An empty vector means
    /// the end of the file was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<CardPayload> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<PaymentCsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert_csv_record(record) {
                    Ok(payload) => batch.push(payload),
                    Err(e) => warn!("Record conversion error: {}", e),
                },
                Some(Err(e)) => warn!("CSV parse error: {}", LedgerError::from(e)),
                None => break,
            }
        }

        batch
    }
}
