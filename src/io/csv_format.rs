//! CSV format handling for payment input and summary output
//!
//! This module centralizes all CSV format concerns, providing:
//! - PaymentCsvRecord structure for deserialization
//! - Conversion from CSV records to card payloads
//! - CardCsvRecord structure for card registration files
//! - Account summary output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::core::builder::category_for_mcc;
use crate::types::{CardPayload, LedgerError, TransactionSummary};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// `card_number,amount,merchant_name,merchant_city,merchant_country,category,timestamp`
/// and an optional trailing `mcc` column used when `category` is empty.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PaymentCsvRecord {
    pub card_number: String,
    pub amount: String,
    pub merchant_name: String,
    #[serde(default)]
    pub merchant_city: Option<String>,
    #[serde(default)]
    pub merchant_country: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub mcc: Option<String>,
}

/// Convert a PaymentCsvRecord to a CardPayload
///
/// - Parses the amount as integer minor units
/// - Turns empty locale columns into `None`
/// - Maps the `mcc` column to a category when `category` is empty
///
/// Business rules (positive amount, known card, ...) are left to the
/// pipeline so that rejected rows are reported like any other failure.
///
/// # Returns
///
/// * `Ok(CardPayload)` - Successfully converted record
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_csv_record(record: PaymentCsvRecord) -> Result<CardPayload, String> {
    let amount = record.amount.trim().parse::<i64>().map_err(|_| {
        format!(
            "Invalid amount '{}' for card {}",
            record.amount, record.card_number
        )
    })?;

    let category = match non_empty(record.category) {
        Some(category) => category,
        None => non_empty(record.mcc)
            .map(|mcc| category_for_mcc(&mcc).to_string())
            .unwrap_or_default(),
    };

    Ok(CardPayload {
        card_number: record.card_number,
        amount,
        merchant_name: record.merchant_name,
        merchant_city: non_empty(record.merchant_city),
        merchant_country: non_empty(record.merchant_country),
        category,
        timestamp: record.timestamp,
    })
}

/// Card registration row: `name,email,card_number,card_type`
///
/// The account is identified by its email; rows sharing an email register
/// several cards for one account.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CardCsvRecord {
    pub name: String,
    pub email: String,
    pub card_number: String,
    pub card_type: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Write account summaries to CSV format
///
/// Writes summaries with columns:
/// `user_id,total_amount,total_count,avg_amount,top_category,top_merchant`,
/// sorted by user id for deterministic output.
///
/// # Arguments
///
/// * `summaries` - Summaries to write
/// * `output` - Mutable reference to a writer for outputting CSV
pub fn write_summaries_csv(
    summaries: &[TransactionSummary],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    use csv::Writer;

    let write_error = |e: csv::Error| LedgerError::IoError {
        message: format!("Failed to write summary CSV: {}", e),
    };

    let mut writer = Writer::from_writer(output);
    writer
        .write_record([
            "user_id",
            "total_amount",
            "total_count",
            "avg_amount",
            "top_category",
            "top_merchant",
        ])
        .map_err(write_error)?;

    let mut sorted = summaries.to_vec();
    sorted.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    for summary in sorted {
        writer
            .write_record(&[
                summary.account_id,
                summary.total_amount.to_string(),
                summary.total_count.to_string(),
                format!("{:.2}", summary.avg_amount),
                summary.top_category,
                summary.top_merchant,
            ])
            .map_err(write_error)?;
    }

    writer.flush()?;
    Ok(())
}
