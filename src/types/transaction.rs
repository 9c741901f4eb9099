//! Transaction-related types for the card ledger
//!
//! This module defines the intake payload, the persisted transaction record,
//! its lifecycle status and the derived per-account summary.

use super::account::{AccountId, CardId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction identifier (UUID v4 rendered as a string)
pub type TransactionId = String;

/// Lifecycle status of a transaction
///
/// Every transaction is written as `Pending` and moves exactly once to one of
/// the two terminal states after settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Persisted, waiting for settlement
    Pending,

    /// Settlement authorized the payment
    Completed,

    /// Settlement rejected the payment (risk limit or transient failure)
    Failed,
}

impl TransactionStatus {
    /// Storage and wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is defined from this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Whether `self -> next` is the single allowed forward transition
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(self, TransactionStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Raw card-payment payload as delivered by a payment rail
///
/// This is the intake DTO shared by the HTTP API and the event stream. It
/// only lives for the duration of one pipeline invocation and is never
/// persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPayload {
    /// Card number the payment was made with
    pub card_number: String,

    /// Amount in integer minor units (cents)
    pub amount: i64,

    /// Merchant the payment was made at
    pub merchant_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_country: Option<String>,

    /// Spending category (groceries, gas, ...)
    ///
    /// Callers holding a merchant-category code map it with
    /// [`crate::core::builder::category_for_mcc`] before building.
    #[serde(default)]
    pub category: String,

    /// When the purchase happened, RFC 3339 / ISO-8601
    pub timestamp: String,
}

/// A card payment recorded in the ledger
///
/// Account, card and amount never change after the first write. Only
/// `status` and `updated_at` move, once, from pending to a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Owning account
    #[serde(rename = "user_id")]
    pub account_id: AccountId,

    /// Card the payment was made with
    pub card_id: CardId,

    /// Amount in integer minor units, strictly positive
    pub amount: i64,

    pub merchant_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_country: Option<String>,

    pub category: String,

    /// Human readable description, e.g. "Card payment at Coffee Shop"
    pub description: String,

    pub status: TransactionStatus,

    /// When the purchase happened (from the payload)
    pub timestamp: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate over the completed transactions of one account
///
/// Computed on demand and never stored. An account without completed
/// transactions has a zero-valued summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    #[serde(rename = "user_id")]
    pub account_id: AccountId,

    /// Sum of completed amounts in minor units
    pub total_amount: i64,

    /// Number of completed transactions
    pub total_count: u64,

    /// Mean completed amount in minor units, rounded to two decimal places
    pub avg_amount: Decimal,

    /// Most frequent category (empty when there is none)
    pub top_category: String,

    /// Most frequent merchant (empty when there is none)
    pub top_merchant: String,
}

impl TransactionSummary {
    /// Zero-valued summary for an account without completed transactions
    pub fn empty(account_id: impl Into<AccountId>) -> Self {
        TransactionSummary {
            account_id: account_id.into(),
            total_amount: 0,
            total_count: 0,
            avg_amount: Decimal::ZERO,
            top_category: String::new(),
            top_merchant: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(TransactionStatus::Pending, "pending")]
    #[case::completed(TransactionStatus::Completed, "completed")]
    #[case::failed(TransactionStatus::Failed, "failed")]
    fn test_status_string_round_trip(#[case] status: TransactionStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(text.parse::<TransactionStatus>().unwrap(), status);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("settled".parse::<TransactionStatus>().is_err());
    }

    #[rstest]
    #[case::pending_to_completed(TransactionStatus::Pending, TransactionStatus::Completed, true)]
    #[case::pending_to_failed(TransactionStatus::Pending, TransactionStatus::Failed, true)]
    #[case::pending_to_pending(TransactionStatus::Pending, TransactionStatus::Pending, false)]
    #[case::completed_to_failed(TransactionStatus::Completed, TransactionStatus::Failed, false)]
    #[case::failed_to_completed(TransactionStatus::Failed, TransactionStatus::Completed, false)]
    fn test_status_transitions(
        #[case] from: TransactionStatus,
        #[case] to: TransactionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_payload_defaults_optional_fields() {
        let json = r#"{"card_number":"4111","amount":2500,"merchant_name":"Coffee Shop","timestamp":"2024-01-15T10:30:00Z"}"#;
        let payload: CardPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.category, "");
        assert_eq!(payload.merchant_city, None);
    }

    #[test]
    fn test_empty_summary_is_zero_valued() {
        let summary = TransactionSummary::empty("acc-1");
        assert_eq!(summary.total_amount, 0);
        assert_eq!(summary.total_count, 0);
        assert_eq!(summary.avg_amount, Decimal::ZERO);
        assert!(summary.top_category.is_empty());
    }
}
