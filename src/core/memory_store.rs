//! Thread-safe in-memory ledger storage
//!
//! This module provides the `MemoryStore` struct, which keeps accounts, cards
//! and transactions in concurrent maps so that request handlers and consumer
//! workers can share it without a global lock.
//!
//! # Design
//!
//! `DashMap` shards its contents and locks per shard. Uniqueness checks are
//! done through the entry API so that the check and the insert happen under
//! the same shard lock:
//! - `contacts` maps an email to its account and guards contact uniqueness
//! - `cards` groups every card record by card number and guards the
//!   "one active card per number" rule
//! - `transactions` is keyed by identity and guards "one row per identity"

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::LedgerStore;
use crate::types::{Account, AccountId, Card, LedgerError, Transaction, TransactionStatus};

/// Thread-safe in-memory implementation of [`LedgerStore`]
///
/// Used by the tests and by `serve` when no database path is configured.
/// Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Accounts by identity
    accounts: DashMap<AccountId, Account>,

    /// Account identity by contact identifier
    contacts: DashMap<String, AccountId>,

    /// Every card record by card number (active and deactivated)
    cards: DashMap<String, Vec<Card>>,

    /// Transactions by identity
    transactions: DashMap<String, Transaction>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn create_account(&self, account: &Account) -> Result<(), LedgerError> {
        match self.contacts.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateContact {
                email: account.email.clone(),
            }),
            Entry::Vacant(slot) => {
                self.accounts.insert(account.id.clone(), account.clone());
                slot.insert(account.id.clone());
                Ok(())
            }
        }
    }

    fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        self.accounts
            .get(account_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    fn create_card(&self, card: &Card) -> Result<(), LedgerError> {
        if !self.accounts.contains_key(&card.account_id) {
            return Err(LedgerError::account_not_found(&card.account_id));
        }

        let mut records = self.cards.entry(card.card_number.clone()).or_default();
        if card.active && records.iter().any(|existing| existing.active) {
            return Err(LedgerError::DuplicateCard {
                card_number: card.card_number.clone(),
            });
        }
        records.push(card.clone());
        Ok(())
    }

    fn cards_by_number(&self, card_number: &str) -> Result<Vec<Card>, LedgerError> {
        Ok(self
            .cards
            .get(card_number)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn deactivate_card(&self, card_number: &str) -> Result<Card, LedgerError> {
        let mut records = self
            .cards
            .get_mut(card_number)
            .ok_or_else(|| LedgerError::card_not_found(card_number))?;

        let card = records
            .iter_mut()
            .find(|card| card.active)
            .ok_or_else(|| LedgerError::card_not_found(card_number))?;
        card.active = false;
        Ok(card.clone())
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        // Second line of defense behind the validator, like a CHECK constraint
        if transaction.amount <= 0 {
            return Err(LedgerError::storage(format!(
                "check constraint failed: amount > 0 (transaction {})",
                transaction.id
            )));
        }

        match self.transactions.entry(transaction.id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateTransaction {
                id: transaction.id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(transaction.clone());
                Ok(())
            }
        }
    }

    fn update_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| LedgerError::transaction_not_found(id))?;

        let transaction = entry.value_mut();
        if !transaction.status.can_transition_to(status) {
            return Err(LedgerError::invalid_transition(id, transaction.status, status));
        }
        transaction.status = status;
        transaction.updated_at = updated_at;
        Ok(transaction.clone())
    }

    fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        self.transactions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::transaction_not_found(id))
    }

    fn transactions_for_account(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.value().account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect();

        transactions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });

        Ok(transactions.into_iter().skip(offset).take(limit).collect())
    }

    fn transactions_with_status(
        &self,
        account_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| {
                let transaction = entry.value();
                transaction.account_id == account_id && transaction.status == status
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn transaction_count(&self) -> Result<usize, LedgerError> {
        Ok(self.transactions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::sample_transaction;
    use chrono::Duration;
    use std::sync::Arc;

    fn store_with_account() -> (MemoryStore, Account) {
        let store = MemoryStore::new();
        let account = Account::new("Ada", "ada@example.com");
        store.create_account(&account).unwrap();
        (store, account)
    }

    #[test]
    fn test_create_and_get_account() {
        let (store, account) = store_with_account();
        assert_eq!(store.get_account(&account.id).unwrap(), account);
    }

    #[test]
    fn test_duplicate_contact_is_rejected() {
        let (store, _) = store_with_account();
        let other = Account::new("Someone Else", "ada@example.com");

        let result = store.create_account(&other);
        assert!(matches!(result, Err(LedgerError::DuplicateContact { .. })));
        assert!(store.get_account(&other.id).is_err());
    }

    #[test]
    fn test_card_requires_existing_account() {
        let store = MemoryStore::new();
        let card = Card::new("missing", "4111", "visa");

        let result = store.create_card(&card);
        assert!(matches!(result, Err(LedgerError::AccountNotFound { .. })));
    }

    #[test]
    fn test_only_one_active_card_per_number() {
        let (store, account) = store_with_account();
        store
            .create_card(&Card::new(&account.id, "4111", "visa"))
            .unwrap();

        let result = store.create_card(&Card::new(&account.id, "4111", "visa"));
        assert!(matches!(result, Err(LedgerError::DuplicateCard { .. })));
    }

    #[test]
    fn test_card_number_can_be_reissued_after_deactivation() {
        let (store, account) = store_with_account();
        let first = Card::new(&account.id, "4111", "visa");
        store.create_card(&first).unwrap();

        let deactivated = store.deactivate_card("4111").unwrap();
        assert_eq!(deactivated.id, first.id);
        assert!(!deactivated.active);

        store
            .create_card(&Card::new(&account.id, "4111", "visa"))
            .unwrap();
        let records = store.cards_by_number("4111").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|card| card.active).count(), 1);
    }

    #[test]
    fn test_deactivate_unknown_card() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.deactivate_card("0000"),
            Err(LedgerError::CardNotFound { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_duplicate_identity() {
        let store = MemoryStore::new();
        let transaction = sample_transaction("acc-1", 500, "food");
        store.insert_transaction(&transaction).unwrap();

        let result = store.insert_transaction(&transaction);
        assert!(matches!(result, Err(LedgerError::DuplicateTransaction { .. })));
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn test_insert_rejects_non_positive_amount() {
        let store = MemoryStore::new();
        let transaction = sample_transaction("acc-1", 0, "food");

        let result = store.insert_transaction(&transaction);
        assert!(matches!(result, Err(LedgerError::Storage { .. })));
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_status_moves_once() {
        let store = MemoryStore::new();
        let transaction = sample_transaction("acc-1", 500, "food");
        store.insert_transaction(&transaction).unwrap();

        let updated = store
            .update_transaction_status(&transaction.id, TransactionStatus::Failed, Utc::now())
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Failed);

        let second = store.update_transaction_status(
            &transaction.id,
            TransactionStatus::Completed,
            Utc::now(),
        );
        assert!(matches!(second, Err(LedgerError::InvalidTransition { .. })));
        assert_eq!(
            store.get_transaction(&transaction.id).unwrap().status,
            TransactionStatus::Failed
        );
    }

    #[test]
    fn test_transactions_are_paginated_newest_first() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut transaction = sample_transaction("acc-1", 100 + i, "food");
            transaction.timestamp = base + Duration::minutes(i);
            store.insert_transaction(&transaction).unwrap();
        }
        store
            .insert_transaction(&sample_transaction("acc-2", 999, "gas"))
            .unwrap();

        let page = store.transactions_for_account("acc-1", 2, 1).unwrap();
        let amounts: Vec<i64> = page.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![103, 102]);
    }

    #[test]
    fn test_concurrent_inserts_are_all_kept() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let transaction = sample_transaction("acc-1", 1 + i * 100 + j, "food");
                        store.insert_transaction(&transaction).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.transaction_count().unwrap(), 200);
    }
}
