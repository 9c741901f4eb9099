//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account and card types
//! - `transaction`: Payload, transaction and summary types
//! - `error`: Error types for the card ledger

pub mod account;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountId, Card, CardId};
pub use error::{ErrorKind, LedgerError};
pub use transaction::{
    CardPayload, Transaction, TransactionId, TransactionStatus, TransactionSummary,
};
