//! Account and card registration
//!
//! The registry creates the parties transactions are booked against. It
//! validates the registration fields and leaves the uniqueness rules (one
//! account per contact, one active card per number) to the store.

use std::sync::Arc;

use tracing::info;

use super::traits::LedgerStore;
use crate::types::{Account, Card, LedgerError};

/// Registers and deactivates accounts and cards
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn LedgerStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Register a new account
    ///
    /// # Errors
    ///
    /// - `FieldMissing` when name or email is blank
    /// - `DuplicateContact` when another account already uses the email
    pub fn register_account(&self, name: &str, email: &str) -> Result<Account, LedgerError> {
        require("name", name)?;
        require("email", email)?;

        let account = Account::new(name.trim(), email.trim());
        self.store.create_account(&account)?;
        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    pub fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        self.store.get_account(account_id)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.store.list_accounts()
    }

    /// Register a new active card for an existing account
    ///
    /// # Errors
    ///
    /// - `FieldMissing` when a field is blank
    /// - `AccountNotFound` when the account does not exist
    /// - `DuplicateCard` when an active card already carries the number
    pub fn register_card(
        &self,
        account_id: &str,
        card_number: &str,
        card_type: &str,
    ) -> Result<Card, LedgerError> {
        require("user_id", account_id)?;
        require("card_number", card_number)?;
        require("card_type", card_type)?;

        let card = Card::new(account_id, card_number.trim(), card_type.trim());
        self.store.create_card(&card)?;
        info!(card_id = %card.id, account_id = %card.account_id, "card registered");
        Ok(card)
    }

    /// The active card carrying `card_number`
    pub fn get_active_card(&self, card_number: &str) -> Result<Card, LedgerError> {
        self.store
            .cards_by_number(card_number)?
            .into_iter()
            .find(|card| card.active)
            .ok_or_else(|| LedgerError::card_not_found(card_number))
    }

    /// Deactivate the active card carrying `card_number`
    ///
    /// The card record is kept so that its transactions stay attached.
    pub fn deactivate_card(&self, card_number: &str) -> Result<Card, LedgerError> {
        let card = self.store.deactivate_card(card_number)?;
        info!(card_id = %card.id, "card deactivated");
        Ok(card)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

fn require(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::field_missing(field));
    }
    Ok(())
}
