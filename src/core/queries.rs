//! Read side of the ledger
//!
//! Paginated transaction listing and the per-account summary over completed
//! transactions. Both the REST routes and the GraphQL operations go through
//! [`LedgerQueries`] so they share one set of semantics.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::traits::LedgerStore;
use crate::types::{LedgerError, Transaction, TransactionStatus, TransactionSummary};

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_OFFSET: usize = 0;

/// Page window over an account's transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl Pagination {
    /// Build a window from raw query values
    ///
    /// A missing, non-numeric or out-of-range value falls back to its
    /// default: limit must be > 0, offset must be >= 0.
    pub fn from_raw(limit: Option<&str>, offset: Option<&str>) -> Self {
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .map_or(DEFAULT_LIMIT, |limit| limit as usize);
        let offset = offset
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|offset| *offset >= 0)
            .map_or(DEFAULT_OFFSET, |offset| offset as usize);
        Self { limit, offset }
    }

    /// Build a window from typed values with the same fallbacks
    pub fn from_values(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .filter(|limit| *limit > 0)
                .map_or(DEFAULT_LIMIT, |limit| limit as usize),
            offset: offset
                .filter(|offset| *offset >= 0)
                .map_or(DEFAULT_OFFSET, |offset| offset as usize),
        }
    }
}

/// One page of an account's transactions, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub limit: usize,
    pub offset: usize,
}

/// Aggregate completed transactions of one account
///
/// The top category and top merchant are the most frequent values; ties go
/// to the lexicographically smallest value. The average is rounded to two
/// decimal places. A total that does not fit in `i64` is a `Storage` error.
pub fn summarize(
    account_id: &str,
    completed: &[Transaction],
) -> Result<TransactionSummary, LedgerError> {
    if completed.is_empty() {
        return Ok(TransactionSummary::empty(account_id));
    }

    let total_amount = completed
        .iter()
        .try_fold(0i64, |total, t| total.checked_add(t.amount))
        .ok_or_else(|| {
            LedgerError::storage(format!(
                "completed total of account {} overflows",
                account_id
            ))
        })?;
    let total_count = completed.len() as u64;
    let avg_amount = (Decimal::from(total_amount) / Decimal::from(total_count)).round_dp(2);

    Ok(TransactionSummary {
        account_id: account_id.to_string(),
        total_amount,
        total_count,
        avg_amount,
        top_category: most_frequent(completed.iter().map(|t| t.category.as_str())),
        top_merchant: most_frequent(completed.iter().map(|t| t.merchant_name.as_str())),
    })
}

fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|(a_value, a_count), (b_value, b_count)| {
            a_count.cmp(b_count).then_with(|| b_value.cmp(a_value))
        })
        .map(|(value, _)| value.to_string())
        .unwrap_or_default()
}

/// Query service over the ledger store
#[derive(Clone)]
pub struct LedgerQueries {
    store: Arc<dyn LedgerStore>,
}

impl LedgerQueries {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// One page of the account's transactions
    ///
    /// Fails with `AccountNotFound` for an unknown account.
    pub fn user_transactions(
        &self,
        account_id: &str,
        page: Pagination,
    ) -> Result<TransactionPage, LedgerError> {
        self.store.get_account(account_id)?;
        let transactions = self
            .store
            .transactions_for_account(account_id, page.limit, page.offset)?;
        Ok(TransactionPage {
            transactions,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Summary over the account's completed transactions
    ///
    /// A known account without completed transactions gets a zero summary.
    pub fn user_summary(&self, account_id: &str) -> Result<TransactionSummary, LedgerError> {
        self.store.get_account(account_id)?;
        let completed = self
            .store
            .transactions_with_status(account_id, TransactionStatus::Completed)?;
        summarize(account_id, &completed)
    }

    pub fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        self.store.get_transaction(id)
    }
}

impl std::fmt::Debug for LedgerQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerQueries").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{registered_store, sample_transaction};
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn completed(account_id: &str, amount: i64, category: &str, merchant: &str) -> Transaction {
        let mut transaction = sample_transaction(account_id, amount, category);
        transaction.merchant_name = merchant.to_string();
        transaction.status = TransactionStatus::Completed;
        transaction
    }

    #[test]
    fn test_summary_of_three_completed() {
        let rows = vec![
            completed("acc-1", 500, "food", "Deli"),
            completed("acc-1", 1000, "food", "Deli"),
            completed("acc-1", 1500, "gas", "Shell"),
        ];

        let summary = summarize("acc-1", &rows).unwrap();
        assert_eq!(summary.total_amount, 3000);
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.avg_amount, Decimal::from(1000));
        assert_eq!(summary.top_category, "food");
        assert_eq!(summary.top_merchant, "Deli");
    }

    #[test]
    fn test_summary_average_is_rounded() {
        let rows = vec![
            completed("acc-1", 100, "food", "A"),
            completed("acc-1", 100, "food", "A"),
            completed("acc-1", 101, "food", "A"),
        ];
        assert_eq!(
            summarize("acc-1", &rows).unwrap().avg_amount,
            Decimal::from_str("100.33").unwrap()
        );
    }

    #[test]
    fn test_summary_tie_goes_to_smallest_value() {
        let rows = vec![
            completed("acc-1", 100, "gas", "Shell"),
            completed("acc-1", 100, "food", "Deli"),
        ];
        let summary = summarize("acc-1", &rows).unwrap();
        assert_eq!(summary.top_category, "food");
        assert_eq!(summary.top_merchant, "Deli");
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(
            summarize("acc-1", &[]).unwrap(),
            TransactionSummary::empty("acc-1")
        );
    }

    #[test]
    fn test_summary_total_overflow_is_an_error() {
        let rows = vec![
            completed("acc-1", i64::MAX / 2 + 1, "food", "Deli"),
            completed("acc-1", i64::MAX / 2 + 1, "food", "Deli"),
        ];

        let result = summarize("acc-1", &rows);
        assert!(matches!(result, Err(LedgerError::Storage { .. })));
    }

    #[test]
    fn test_summary_total_up_to_i64_max() {
        let rows = vec![
            completed("acc-1", i64::MAX - 1, "food", "Deli"),
            completed("acc-1", 1, "food", "Deli"),
        ];

        let summary = summarize("acc-1", &rows).unwrap();
        assert_eq!(summary.total_amount, i64::MAX);
        assert_eq!(summary.total_count, 2);
    }

    #[test]
    fn test_user_summary_overflow_surfaces_as_error() {
        let (store, account, _) = registered_store();
        let queries = LedgerQueries::new(Arc::clone(&store));

        for _ in 0..2 {
            let transaction = sample_transaction(&account.id, i64::MAX / 2 + 1, "food");
            store.insert_transaction(&transaction).unwrap();
            store
                .update_transaction_status(&transaction.id, TransactionStatus::Completed, Utc::now())
                .unwrap();
        }

        assert!(matches!(
            queries.user_summary(&account.id),
            Err(LedgerError::Storage { .. })
        ));
    }

    #[rstest]
    #[case::defaults(None, None, 10, 0)]
    #[case::explicit(Some("25"), Some("5"), 25, 5)]
    #[case::zero_limit(Some("0"), Some("0"), 10, 0)]
    #[case::negative(Some("-3"), Some("-1"), 10, 0)]
    #[case::garbage(Some("many"), Some("x"), 10, 0)]
    fn test_pagination_fallbacks(
        #[case] limit: Option<&str>,
        #[case] offset: Option<&str>,
        #[case] expected_limit: usize,
        #[case] expected_offset: usize,
    ) {
        let page = Pagination::from_raw(limit, offset);
        assert_eq!(page.limit, expected_limit);
        assert_eq!(page.offset, expected_offset);
    }

    #[test]
    fn test_typed_pagination_fallbacks() {
        assert_eq!(Pagination::from_values(Some(-1), Some(-1)), Pagination::default());
        assert_eq!(
            Pagination::from_values(Some(3), Some(2)),
            Pagination { limit: 3, offset: 2 }
        );
    }

    #[test]
    fn test_queries_only_count_completed() {
        let (store, account, _) = registered_store();
        let queries = LedgerQueries::new(Arc::clone(&store));

        for (amount, status) in [
            (500, TransactionStatus::Completed),
            (700, TransactionStatus::Failed),
            (900, TransactionStatus::Pending),
        ] {
            let transaction = sample_transaction(&account.id, amount, "food");
            store.insert_transaction(&transaction).unwrap();
            if status.is_terminal() {
                store
                    .update_transaction_status(&transaction.id, status, Utc::now())
                    .unwrap();
            }
        }

        let summary = queries.user_summary(&account.id).unwrap();
        assert_eq!(summary.total_amount, 500);
        assert_eq!(summary.total_count, 1);

        let page = queries
            .user_transactions(&account.id, Pagination::default())
            .unwrap();
        assert_eq!(page.transactions.len(), 3);
        assert_eq!((page.limit, page.offset), (10, 0));
    }

    #[test]
    fn test_unknown_account() {
        let (store, _, _) = registered_store();
        let queries = LedgerQueries::new(store);

        assert!(matches!(
            queries.user_summary("missing"),
            Err(LedgerError::AccountNotFound { .. })
        ));
        assert!(matches!(
            queries.user_transactions("missing", Pagination::default()),
            Err(LedgerError::AccountNotFound { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_summary_totals(amounts in proptest::collection::vec(1i64..1_000_000, 1..40)) {
            let rows: Vec<Transaction> = amounts
                .iter()
                .map(|amount| completed("acc-1", *amount, "food", "Deli"))
                .collect();

            let summary = summarize("acc-1", &rows).unwrap();
            prop_assert_eq!(summary.total_amount, amounts.iter().sum::<i64>());
            prop_assert_eq!(summary.total_count, amounts.len() as u64);
            prop_assert!(summary.avg_amount >= Decimal::from(*amounts.iter().min().unwrap()));
            prop_assert!(summary.avg_amount <= Decimal::from(*amounts.iter().max().unwrap()));
        }
    }
}
