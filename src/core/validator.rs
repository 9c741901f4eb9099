//! Structural validation of built transactions
//!
//! Validation is a pure function over a transaction that has been built but
//! not yet persisted. Rules are checked in a fixed order and the first
//! failing rule decides the error:
//!
//! 1. amount > 0
//! 2. account and card references are non-empty
//! 3. merchant name is non-empty
//! 4. category is non-empty

use crate::types::{LedgerError, Transaction};

/// Check a transaction against the structural rules
///
/// # Returns
///
/// * `Ok(())` if every rule passes
/// * `Err(LedgerError)` for the first rule that fails
pub fn validate(transaction: &Transaction) -> Result<(), LedgerError> {
    if transaction.amount <= 0 {
        return Err(LedgerError::AmountInvalid {
            amount: transaction.amount,
        });
    }

    if transaction.account_id.is_empty() {
        return Err(LedgerError::reference_missing("account"));
    }
    if transaction.card_id.is_empty() {
        return Err(LedgerError::reference_missing("card"));
    }

    if transaction.merchant_name.trim().is_empty() {
        return Err(LedgerError::MerchantMissing);
    }

    if transaction.category.trim().is_empty() {
        return Err(LedgerError::CategoryMissing);
    }

    Ok(())
}
