//! Account and card types for the card ledger
//!
//! This module defines the registered parties of the ledger: accounts (the
//! users transactions are booked against) and the payment cards they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account identifier
///
/// Opaque string identity (a UUID v4 when created by the registry).
pub type AccountId = String;

/// Card identifier
pub type CardId = String;

/// A registered ledger account
///
/// The contact identifier (`email`) is unique across all accounts. Apart from
/// its timestamps an account is immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque account identity
    pub id: AccountId,

    /// Display name
    pub name: String,

    /// Contact identifier, unique across accounts
    pub email: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a fresh identity
    ///
    /// # Arguments
    ///
    /// * `name` - Display name of the account holder
    /// * `email` - Contact identifier (must be unique in the store)
    ///
    /// # Returns
    ///
    /// A new Account whose creation and update timestamps are both "now".
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A payment card owned by an account
///
/// Cards are never deleted; they are deactivated so that their transaction
/// history stays attached. At most one active card exists per card number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque card identity
    pub id: CardId,

    /// Owning account (must exist when the card is registered)
    #[serde(rename = "user_id")]
    pub account_id: AccountId,

    /// Card number as presented by the payment rail
    pub card_number: String,

    /// Network tag (visa, mastercard, ...)
    pub card_type: String,

    /// Whether the card can still be charged
    #[serde(rename = "is_active")]
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Create a new active card for an account
    pub fn new(
        account_id: impl Into<AccountId>,
        card_number: impl Into<String>,
        card_type: impl Into<String>,
    ) -> Self {
        Card {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            card_number: card_number.into(),
            card_type: card_type.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_has_matching_timestamps() {
        let account = Account::new("Ada", "ada@example.com");
        assert!(!account.id.is_empty());
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn test_new_card_is_active() {
        let card = Card::new("acc-1", "4111-1111-1111-1111", "visa");
        assert!(card.active);
        assert_eq!(card.account_id, "acc-1");
    }

    #[test]
    fn test_card_serializes_with_api_field_names() {
        let card = Card::new("acc-1", "4111", "visa");
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["user_id"], "acc-1");
        assert_eq!(json["is_active"], true);
    }
}
