//! Transaction construction from card payloads
//!
//! The builder turns a [`CardPayload`] plus its resolved owner into a pending
//! [`Transaction`] with a fresh identity. Identity is generated here and only
//! here, so every build produces a distinct row.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::resolver::ResolvedCard;
use crate::types::{CardPayload, LedgerError, Transaction, TransactionStatus};

/// Category used when a merchant-category code has no mapping
pub const DEFAULT_CATEGORY: &str = "general";

/// Map a merchant-category code to a spending category
///
/// Grocery codes map to "groceries", fuel codes to "gas", dining codes to
/// "dining"; everything else is "general".
pub fn category_for_mcc(mcc: &str) -> &'static str {
    match mcc.trim() {
        "5411" | "5412" => "groceries",
        "5541" | "5542" => "gas",
        "5812" | "5814" => "dining",
        _ => DEFAULT_CATEGORY,
    }
}

/// Description recorded for a payment at `merchant_name`
pub fn describe(merchant_name: &str) -> String {
    format!("Card payment at {}", merchant_name)
}

/// Parse an RFC 3339 timestamp and normalize it to UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| LedgerError::timestamp_invalid(value, e))
}

/// Build a pending transaction stamped with the current time
pub fn build(payload: &CardPayload, owner: &ResolvedCard) -> Result<Transaction, LedgerError> {
    build_at(payload, owner, Utc::now())
}

/// Build a pending transaction stamped with `now`
///
/// # Arguments
///
/// * `payload` - The raw card payment
/// * `owner` - Account and card the card number resolved to
/// * `now` - Creation and update timestamp of the record
///
/// # Returns
///
/// * `Ok(Transaction)` in `Pending` status with a new UUID v4 identity
/// * `Err(TimestampInvalid)` if the payload timestamp does not parse
pub fn build_at(
    payload: &CardPayload,
    owner: &ResolvedCard,
    now: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    let timestamp = parse_timestamp(&payload.timestamp)?;

    Ok(Transaction {
        id: Uuid::new_v4().to_string(),
        account_id: owner.account_id.clone(),
        card_id: owner.card_id.clone(),
        amount: payload.amount,
        merchant_name: payload.merchant_name.clone(),
        merchant_city: payload.merchant_city.clone(),
        merchant_country: payload.merchant_country.clone(),
        category: payload.category.clone(),
        description: describe(&payload.merchant_name),
        status: TransactionStatus::Pending,
        timestamp,
        created_at: now,
        updated_at: now,
    })
}
