//! Card to account resolution
//!
//! Maps the card number of an incoming payment to the account and card the
//! transaction is booked against. Resolution is a read-only lookup against
//! the store and can run concurrently from any number of pipeline invocations.

use std::sync::Arc;

use super::traits::LedgerStore;
use crate::types::{AccountId, CardId, LedgerError};

/// Owning account and card of a card number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCard {
    pub account_id: AccountId,
    pub card_id: CardId,
}

/// Resolves card numbers against the store
#[derive(Clone)]
pub struct CardResolver {
    store: Arc<dyn LedgerStore>,
}

impl CardResolver {
    /// Create a resolver reading from `store`
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolve a card number to its owning account and active card
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedCard)` for the active card carrying the number
    /// * `Err(CardNotFound)` if no card record carries the number
    /// * `Err(CardInactive)` if card records exist but none is active
    pub fn resolve(&self, card_number: &str) -> Result<ResolvedCard, LedgerError> {
        let records = self.store.cards_by_number(card_number)?;
        if records.is_empty() {
            return Err(LedgerError::card_not_found(card_number));
        }

        records
            .into_iter()
            .find(|card| card.active)
            .map(|card| ResolvedCard {
                account_id: card.account_id,
                card_id: card.id,
            })
            .ok_or_else(|| LedgerError::card_inactive(card_number))
    }
}

impl std::fmt::Debug for CardResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardResolver").finish_non_exhaustive()
    }
}
