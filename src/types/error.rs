//! Error types for the card ledger
//!
//! This module defines every error that can occur while registering cards,
//! processing card payments and consuming the payment stream.
//!
//! # Error Categories
//!
//! - **Not found**: unknown account, card or transaction, inactive card
//! - **Validation**: malformed payloads, rejected before anything is written
//! - **Risk / transient**: settlement outcomes, recorded as failed transactions
//! - **Conflict**: uniqueness and status-transition violations
//! - **Storage / serialization**: infrastructure failures

use super::transaction::TransactionStatus;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
///
/// Used by the transport layers to decide how an error is surfaced
/// (HTTP status code, consumer log level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    RiskRejected,
    Transient,
    Storage,
    Serialization,
}

/// Main error type for the card ledger
///
/// Each variant carries enough context to diagnose the failure from a log
/// line alone.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No account with this identity
    #[error("Account {account_id} not found")]
    AccountNotFound {
        /// The account identity that was looked up
        account_id: String,
    },

    /// No card record matches the card number
    #[error("Card {card_number} not found")]
    CardNotFound {
        /// The card number that was looked up
        card_number: String,
    },

    /// Card records exist for the number, but none is active
    #[error("Card {card_number} is inactive")]
    CardInactive {
        /// The card number that was looked up
        card_number: String,
    },

    /// No transaction with this identity
    #[error("Transaction {id} not found")]
    TransactionNotFound {
        /// The transaction identity that was looked up
        id: String,
    },

    /// Amount is zero or negative
    #[error("Amount must be positive, got {amount}")]
    AmountInvalid {
        /// The rejected amount in minor units
        amount: i64,
    },

    /// Account or card reference is empty
    #[error("Transaction is missing its {field} reference")]
    ReferenceMissing {
        /// Which reference is missing ("account" or "card")
        field: String,
    },

    #[error("Merchant name cannot be empty")]
    MerchantMissing,

    /// A required registration field is empty
    #[error("Field {field} is required")]
    FieldMissing {
        /// Name of the empty field
        field: String,
    },

    #[error("Category cannot be empty")]
    CategoryMissing,

    /// Payload timestamp is not RFC 3339 / ISO-8601
    #[error("Invalid timestamp '{value}': {message}")]
    TimestampInvalid {
        /// The raw timestamp string
        value: String,
        /// Parser error description
        message: String,
    },

    /// Settlement rejected the amount as above the per-transaction ceiling
    #[error("Transaction amount {amount} exceeds limit {limit}")]
    AmountExceedsLimit {
        /// Requested amount in minor units
        amount: i64,
        /// Configured ceiling in minor units
        limit: i64,
    },

    /// Simulated transient failure while talking to the authorizer
    #[error("Processing failed due to network error: {message}")]
    NetworkFailure {
        /// Description of the failure
        message: String,
    },

    /// Another account already uses this contact identifier
    #[error("An account with contact {email} already exists")]
    DuplicateContact {
        /// The duplicated contact identifier
        email: String,
    },

    /// An active card with this number already exists
    #[error("An active card with number {card_number} already exists")]
    DuplicateCard {
        /// The duplicated card number
        card_number: String,
    },

    /// A transaction with this identity was already written
    #[error("Transaction {id} already exists")]
    DuplicateTransaction {
        /// The duplicated transaction identity
        id: String,
    },

    /// Status change other than the single pending -> terminal transition
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Transaction identity
        id: String,
        /// Current status
        from: TransactionStatus,
        /// Requested status
        to: TransactionStatus,
    },

    /// Storage backend failure (connection, query, constraint)
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// A payload or stream record could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the failure
        message: String,
    },

    /// I/O error while reading input files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },
}

impl LedgerError {
    /// Classify the error for transport-level handling
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound { .. }
            | LedgerError::CardNotFound { .. }
            | LedgerError::CardInactive { .. }
            | LedgerError::TransactionNotFound { .. } => ErrorKind::NotFound,
            LedgerError::AmountInvalid { .. }
            | LedgerError::ReferenceMissing { .. }
            | LedgerError::MerchantMissing
            | LedgerError::FieldMissing { .. }
            | LedgerError::CategoryMissing
            | LedgerError::TimestampInvalid { .. } => ErrorKind::Validation,
            LedgerError::AmountExceedsLimit { .. } => ErrorKind::RiskRejected,
            LedgerError::NetworkFailure { .. } => ErrorKind::Transient,
            LedgerError::DuplicateContact { .. }
            | LedgerError::DuplicateCard { .. }
            | LedgerError::DuplicateTransaction { .. }
            | LedgerError::InvalidTransition { .. } => ErrorKind::Conflict,
            LedgerError::Storage { .. } | LedgerError::IoError { .. } => ErrorKind::Storage,
            LedgerError::Serialization { .. } => ErrorKind::Serialization,
        }
    }

    /// Machine-readable error code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::CardNotFound { .. } => "CARD_NOT_FOUND",
            LedgerError::CardInactive { .. } => "CARD_INACTIVE",
            LedgerError::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            LedgerError::AmountInvalid { .. } => "AMOUNT_INVALID",
            LedgerError::ReferenceMissing { .. } => "REFERENCE_MISSING",
            LedgerError::MerchantMissing => "MERCHANT_MISSING",
            LedgerError::FieldMissing { .. } => "FIELD_MISSING",
            LedgerError::CategoryMissing => "CATEGORY_MISSING",
            LedgerError::TimestampInvalid { .. } => "TIMESTAMP_INVALID",
            LedgerError::AmountExceedsLimit { .. } => "AMOUNT_EXCEEDS_LIMIT",
            LedgerError::NetworkFailure { .. } => "NETWORK_FAILURE",
            LedgerError::DuplicateContact { .. } => "DUPLICATE_CONTACT",
            LedgerError::DuplicateCard { .. } => "DUPLICATE_CARD",
            LedgerError::DuplicateTransaction { .. } => "DUPLICATE_TRANSACTION",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::Storage { .. } => "STORAGE_ERROR",
            LedgerError::Serialization { .. } => "SERIALIZATION_ERROR",
            LedgerError::IoError { .. } => "IO_ERROR",
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(error: rusqlite::Error) -> Self {
        LedgerError::Storage {
            message: error.to_string(),
        }
    }
}

impl From<r2d2::Error> for LedgerError {
    fn from(error: r2d2::Error) -> Self {
        LedgerError::Storage {
            message: format!("connection pool: {}", error),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for LedgerError {
    fn from(error: csv_async::Error) -> Self {
        LedgerError::Serialization {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an AccountNotFound error
    pub fn account_not_found(account_id: &str) -> Self {
        LedgerError::AccountNotFound {
            account_id: account_id.to_string(),
        }
    }

    /// Create a CardNotFound error
    pub fn card_not_found(card_number: &str) -> Self {
        LedgerError::CardNotFound {
            card_number: card_number.to_string(),
        }
    }

    /// Create a CardInactive error
    pub fn card_inactive(card_number: &str) -> Self {
        LedgerError::CardInactive {
            card_number: card_number.to_string(),
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(id: &str) -> Self {
        LedgerError::TransactionNotFound { id: id.to_string() }
    }

    /// Create a ReferenceMissing error
    pub fn reference_missing(field: &str) -> Self {
        LedgerError::ReferenceMissing {
            field: field.to_string(),
        }
    }

    /// Create a FieldMissing error
    pub fn field_missing(field: &str) -> Self {
        LedgerError::FieldMissing {
            field: field.to_string(),
        }
    }

    /// Create a TimestampInvalid error
    pub fn timestamp_invalid(value: &str, message: impl ToString) -> Self {
        LedgerError::TimestampInvalid {
            value: value.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(id: &str, from: TransactionStatus, to: TransactionStatus) -> Self {
        LedgerError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl ToString) -> Self {
        LedgerError::Storage {
            message: message.to_string(),
        }
    }
}
