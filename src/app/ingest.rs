//! The `ingest` command
//!
//! Replays a CSV file of card payments through the event bridge:
//! 1. Registers the cards of the optional registration file
//! 2. Starts the consumer pool
//! 3. Publishes the payments in batches, keyed by card number
//! 4. Waits until the pool has committed every record, then stops it
//! 5. Writes the summary of every account as CSV
//!
//! Rows that fail to parse, cards that are already registered, and payments
//! the pipeline rejects are logged; none of them aborts the run.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Ledger;
use crate::core::{LedgerQueries, Registry};
use crate::io::{write_summaries_csv, AsyncReader, CardFileReader};
use crate::stream::{join_workers, total_stats, ConsumerStats};
use crate::types::{ErrorKind, LedgerError, TransactionSummary};

/// Payloads read from the CSV file per publish round
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Interval between two checks of the consumer lag
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Outcome of an ingest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Cards registered from the registration file
    pub registered_cards: usize,

    /// Payloads published to the payment topic
    pub published: usize,

    /// Records copied to the dead-letter topic
    pub dead_lettered: usize,

    /// Counters of the consumer pool
    pub stats: ConsumerStats,
}

/// Run the ingest command
///
/// # Arguments
///
/// * `ledger` - Assembled ledger whose pool consumes the payments
/// * `input` - Payment CSV file
/// * `cards` - Optional card registration CSV file
/// * `output` - Writer receiving the account summaries
///
/// # Errors
///
/// Returns an error when a file cannot be opened, the store fails, or the
/// summaries cannot be written.
pub async fn ingest(
    ledger: &Ledger,
    input: &Path,
    cards: Option<&Path>,
    output: &mut dyn Write,
) -> Result<IngestReport, LedgerError> {
    let registered_cards = match cards {
        Some(path) => register_cards(&Registry::new(ledger.store().clone()), path)?,
        None => 0,
    };

    let mut reader = AsyncReader::open(input).await?;

    let shutdown = CancellationToken::new();
    let workers = ledger.pool().spawn(shutdown.clone());

    let producer = ledger.producer();
    let mut published = 0;
    let mut publish_error = None;
    loop {
        let batch = reader.read_batch(DEFAULT_BATCH_SIZE).await;
        if batch.is_empty() {
            break;
        }
        for payload in &batch {
            match producer.publish(payload) {
                Ok(_) => published += 1,
                Err(e) => {
                    publish_error = Some(e);
                    break;
                }
            }
        }
        if publish_error.is_some() {
            break;
        }
        debug!(published, "batch published");
    }

    if publish_error.is_none() {
        ledger.pool().wait_until_drained(DRAIN_POLL).await;
    }
    shutdown.cancel();
    let stats = total_stats(&join_workers(workers).await);

    if let Some(e) = publish_error {
        return Err(e);
    }

    let report = IngestReport {
        registered_cards,
        published,
        dead_lettered: ledger.dead_letters().records().len(),
        stats,
    };
    info!(
        published = report.published,
        completed = report.stats.completed,
        failed = report.stats.failed,
        errors = report.stats.errors,
        dead_lettered = report.dead_lettered,
        "ingest finished"
    );

    let summaries = account_summaries(ledger)?;
    write_summaries_csv(&summaries, output)?;
    Ok(report)
}

/// Register the accounts and cards of a registration file
///
/// Accounts are keyed by email: the first row of an email creates the
/// account, later rows add cards to it. Rows that fail to parse and card
/// numbers that already have an active card are logged and skipped.
///
/// # Returns
///
/// The number of cards registered.
pub fn register_cards(registry: &Registry, path: &Path) -> Result<usize, LedgerError> {
    let reader = CardFileReader::new(path).map_err(|message| LedgerError::IoError { message })?;

    let mut accounts: HashMap<String, String> = registry
        .list_accounts()?
        .into_iter()
        .map(|account| (account.email, account.id))
        .collect();

    let mut registered = 0;
    for row in reader {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping card row: {}", e);
                continue;
            }
        };

        let account_id = match accounts.get(&row.email) {
            Some(id) => id.clone(),
            None => match registry.register_account(&row.name, &row.email) {
                Ok(account) => {
                    accounts.insert(account.email.clone(), account.id.clone());
                    account.id
                }
                Err(e) if e.kind() != ErrorKind::Storage => {
                    warn!(email = %row.email, code = e.code(), "Skipping card row: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            },
        };

        match registry.register_card(&account_id, &row.card_number, &row.card_type) {
            Ok(_) => registered += 1,
            Err(e) if e.kind() != ErrorKind::Storage => {
                warn!(card = %row.card_number, code = e.code(), "Skipping card row: {}", e)
            }
            Err(e) => return Err(e),
        }
    }

    Ok(registered)
}

fn account_summaries(ledger: &Ledger) -> Result<Vec<TransactionSummary>, LedgerError> {
    let queries = LedgerQueries::new(ledger.store().clone());
    ledger
        .store()
        .list_accounts()?
        .iter()
        .map(|account| queries.user_summary(&account.id))
        .collect()
}
