//! Core traits for ledger storage
//!
//! This module defines the storage abstraction that allows the in-memory and
//! the SQLite implementations to be used interchangeably by the pipeline, the
//! registry and the query service.

use chrono::{DateTime, Utc};

use crate::types::{Account, Card, LedgerError, Transaction, TransactionStatus};

/// Typed CRUD collaborator behind every ledger component
///
/// Implementations are shared across request handlers and consumer workers
/// (`Arc<dyn LedgerStore>`), so every method takes `&self` and must be safe
/// to call concurrently. Implementations enforce, at their own boundary:
/// - contact identifiers are unique across accounts
/// - at most one active card per card number, owned by an existing account
/// - transaction amount > 0 and at most one row per transaction identity
/// - status changes only via the single pending -> terminal transition
pub trait LedgerStore: Send + Sync {
    /// Insert a new account
    fn create_account(&self, account: &Account) -> Result<(), LedgerError>;

    /// Get an account by identity
    fn get_account(&self, account_id: &str) -> Result<Account, LedgerError>;

    /// All registered accounts, ordered by creation time
    fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Insert a new card
    fn create_card(&self, card: &Card) -> Result<(), LedgerError>;

    /// Every card record (active or not) registered under a card number
    fn cards_by_number(&self, card_number: &str) -> Result<Vec<Card>, LedgerError>;

    /// Clear the active flag of the active card with this number
    ///
    /// Returns the deactivated card, or `CardNotFound` when no active card
    /// carries the number.
    fn deactivate_card(&self, card_number: &str) -> Result<Card, LedgerError>;

    /// Insert a new transaction row
    fn insert_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Move a transaction to its terminal status
    ///
    /// Returns the updated row. Fails with `InvalidTransition` when the row is
    /// not pending or `status` is not terminal.
    fn update_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError>;

    /// Get a transaction by identity
    fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError>;

    /// Transactions of an account, newest event first
    fn transactions_for_account(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// All transactions of an account with the given status
    fn transactions_with_status(
        &self,
        account_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Total number of transaction rows
    fn transaction_count(&self) -> Result<usize, LedgerError>;
}
