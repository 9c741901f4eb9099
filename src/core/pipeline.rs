//! Transaction intake and settlement pipeline
//!
//! This module provides the `LedgerPipeline`, the single entry point through
//! which card payments become ledger transactions. Both the HTTP handlers and
//! the stream consumer workers call [`LedgerPipeline::process`].
//!
//! # Stages
//!
//! ```text
//! received -> resolved -> built -> validated -> persisted(pending)
//!          -> settled -> persisted(final)
//! ```
//!
//! Failures while resolving, building or validating abort before anything is
//! written. Once the pending row is written the transaction is durable: if the
//! final status write fails the row stays `pending` and the error is returned.
//! There is no rollback and no retry.
//!
//! # Thread Safety
//!
//! The pipeline holds no mutable state of its own. All shared state lives in
//! the store, so one `Arc<LedgerPipeline>` is shared by every request task and
//! every consumer worker.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::builder;
use super::resolver::CardResolver;
use super::settlement::SettlementEngine;
use super::traits::LedgerStore;
use super::validator;
use crate::types::{CardPayload, LedgerError, Transaction};

/// Orchestrates resolution, validation, persistence and settlement
pub struct LedgerPipeline {
    store: Arc<dyn LedgerStore>,
    resolver: CardResolver,
    settlement: Arc<SettlementEngine>,
}

impl LedgerPipeline {
    /// Create a new LedgerPipeline
    ///
    /// # Arguments
    ///
    /// * `store` - Storage collaborator, shared with the registry and queries
    /// * `settlement` - Engine deciding the terminal status
    pub fn new(store: Arc<dyn LedgerStore>, settlement: Arc<SettlementEngine>) -> Self {
        Self {
            resolver: CardResolver::new(Arc::clone(&store)),
            store,
            settlement,
        }
    }

    /// Process one card payment
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` in a terminal status. Risk rejections and transient
    ///   settlement failures are reported as `Failed` transactions, not errors.
    /// * `Err(LedgerError)` if the payload could not be resolved, built or
    ///   validated (nothing written), or if a storage write failed
    ///
    /// # Errors
    ///
    /// - `CardNotFound` / `CardInactive` when the card cannot be charged
    /// - `TimestampInvalid` when the payload timestamp does not parse
    /// - any validation error of [`validator::validate`]
    /// - `Storage` when the pending or the final write fails
    pub async fn process(&self, payload: CardPayload) -> Result<Transaction, LedgerError> {
        let owner = self.resolver.resolve(&payload.card_number)?;
        let pending = builder::build(&payload, &owner)?;
        validator::validate(&pending)?;

        self.store.insert_transaction(&pending)?;
        debug!(
            transaction_id = %pending.id,
            account_id = %pending.account_id,
            amount = pending.amount,
            "transaction persisted as pending"
        );

        let settlement = self.settlement.settle(&pending).await;
        if let Some(reason) = &settlement.reason {
            warn!(
                transaction_id = %pending.id,
                code = reason.code(),
                reason = %reason,
                "settlement failed"
            );
        }

        let settled = self
            .store
            .update_transaction_status(&pending.id, settlement.status, Utc::now())
            .inspect_err(|e| {
                error!(
                    transaction_id = %pending.id,
                    error = %e,
                    "final status write failed, transaction left pending"
                );
            })?;

        info!(
            transaction_id = %settled.id,
            account_id = %settled.account_id,
            amount = settled.amount,
            status = %settled.status,
            "transaction processed"
        );
        Ok(settled)
    }

    /// Storage collaborator the pipeline writes to
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}

impl std::fmt::Debug for LedgerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerPipeline")
            .field("settlement", &self.settlement)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryStore;
    use crate::core::registry::Registry;
    use crate::core::test_support::{
        instant_settlement, registered_store, reliable_pipeline, sample_payload, CARD_NUMBER,
    };
    use crate::types::{Account, Card, TransactionStatus};
    use chrono::DateTime;
    use rstest::rstest;

    #[tokio::test]
    async fn test_valid_payment_completes() {
        let (pipeline, store, account, card) = reliable_pipeline();

        let transaction = pipeline.process(sample_payload(2500)).await.unwrap();

        assert_eq!(transaction.status, TransactionStatus::Completed);
        assert_eq!(transaction.amount, 2500);
        assert_eq!(transaction.account_id, account.id);
        assert_eq!(transaction.card_id, card.id);
        assert_eq!(transaction.description, "Card payment at Coffee Shop");
        assert_eq!(store.get_transaction(&transaction.id).unwrap(), transaction);
    }

    #[tokio::test]
    async fn test_amount_above_limit_is_a_failed_transaction() {
        let (pipeline, store, _, _) = reliable_pipeline();

        let transaction = pipeline.process(sample_payload(1_000_000)).await.unwrap();
        assert_eq!(transaction.status, TransactionStatus::Failed);

        // A terminal row cannot move again
        let again =
            store.update_transaction_status(&transaction.id, TransactionStatus::Completed, Utc::now());
        assert!(matches!(again, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(store.get_transaction(&transaction.id).unwrap(), transaction);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-2500)]
    #[tokio::test]
    async fn test_non_positive_amount_writes_nothing(#[case] amount: i64) {
        let (pipeline, store, _, _) = reliable_pipeline();

        let result = pipeline.process(sample_payload(amount)).await;

        assert!(matches!(result, Err(LedgerError::AmountInvalid { .. })));
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_card_writes_nothing() {
        let (pipeline, store, _, _) = reliable_pipeline();
        let mut payload = sample_payload(2500);
        payload.card_number = "5500-0000-0000-0004".to_string();

        let result = pipeline.process(payload).await;

        assert!(matches!(result, Err(LedgerError::CardNotFound { .. })));
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inactive_card_is_rejected() {
        let (pipeline, store, _, _) = reliable_pipeline();
        Registry::new(Arc::clone(&store))
            .deactivate_card(CARD_NUMBER)
            .unwrap();

        let result = pipeline.process(sample_payload(2500)).await;
        assert!(matches!(result, Err(LedgerError::CardInactive { .. })));
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[rstest]
    #[case::bad_timestamp("merchant", "dining", "not-a-time", "TIMESTAMP_INVALID")]
    #[case::no_merchant("", "dining", "2024-01-15T10:30:00Z", "MERCHANT_MISSING")]
    #[case::no_category("Shop", "", "2024-01-15T10:30:00Z", "CATEGORY_MISSING")]
    #[tokio::test]
    async fn test_malformed_payload_writes_nothing(
        #[case] merchant: &str,
        #[case] category: &str,
        #[case] timestamp: &str,
        #[case] code: &str,
    ) {
        let (pipeline, store, _, _) = reliable_pipeline();
        let mut payload = sample_payload(2500);
        payload.merchant_name = merchant.to_string();
        payload.category = category.to_string();
        payload.timestamp = timestamp.to_string();

        let error = pipeline.process(payload).await.unwrap_err();
        assert_eq!(error.code(), code);
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_submissions_create_distinct_rows() {
        let (pipeline, store, _, _) = reliable_pipeline();

        let first = pipeline.process(sample_payload(2500)).await.unwrap();
        let second = pipeline.process(sample_payload(2500)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.transaction_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_outcome_is_always_terminal() {
        let (store, _, _) = registered_store();
        let pipeline = LedgerPipeline::new(Arc::clone(&store), Arc::new(instant_settlement(0.5)));

        for amount in [1, 500, 99_999, 100_000, 100_001] {
            let transaction = pipeline.process(sample_payload(amount)).await.unwrap();
            assert!(transaction.status.is_terminal());
        }
    }

    /// Store whose status update always fails
    struct BrokenUpdates(MemoryStore);

    impl LedgerStore for BrokenUpdates {
        fn create_account(&self, account: &Account) -> Result<(), LedgerError> {
            self.0.create_account(account)
        }
        fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
            self.0.get_account(account_id)
        }
        fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
            self.0.list_accounts()
        }
        fn create_card(&self, card: &Card) -> Result<(), LedgerError> {
            self.0.create_card(card)
        }
        fn cards_by_number(&self, card_number: &str) -> Result<Vec<Card>, LedgerError> {
            self.0.cards_by_number(card_number)
        }
        fn deactivate_card(&self, card_number: &str) -> Result<Card, LedgerError> {
            self.0.deactivate_card(card_number)
        }
        fn insert_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
            self.0.insert_transaction(transaction)
        }
        fn update_transaction_status(
            &self,
            _id: &str,
            _status: TransactionStatus,
            _updated_at: DateTime<Utc>,
        ) -> Result<Transaction, LedgerError> {
            Err(LedgerError::storage("connection reset"))
        }
        fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
            self.0.get_transaction(id)
        }
        fn transactions_for_account(
            &self,
            account_id: &str,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<Transaction>, LedgerError> {
            self.0.transactions_for_account(account_id, limit, offset)
        }
        fn transactions_with_status(
            &self,
            account_id: &str,
            status: TransactionStatus,
        ) -> Result<Vec<Transaction>, LedgerError> {
            self.0.transactions_with_status(account_id, status)
        }
        fn transaction_count(&self) -> Result<usize, LedgerError> {
            self.0.transaction_count()
        }
    }

    #[tokio::test]
    async fn test_failed_final_write_leaves_pending_row() {
        let store: Arc<dyn LedgerStore> = Arc::new(BrokenUpdates(MemoryStore::new()));
        let registry = Registry::new(Arc::clone(&store));
        let account = registry.register_account("Ada", "ada@example.com").unwrap();
        registry
            .register_card(&account.id, CARD_NUMBER, "visa")
            .unwrap();
        let pipeline = LedgerPipeline::new(Arc::clone(&store), Arc::new(instant_settlement(0.0)));

        let result = pipeline.process(sample_payload(2500)).await;
        assert!(matches!(result, Err(LedgerError::Storage { .. })));

        let rows = store.transactions_for_account(&account.id, 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TransactionStatus::Pending);
    }
}
