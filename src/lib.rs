//! Card Ledger Library
//! # Overview
//!
//! This library ingests card-payment events, records each one as a ledger
//! transaction, runs it through a simulated settlement step, and answers
//! queries over the recorded history. Payments arrive synchronously over
//! HTTP or asynchronously through a partitioned event stream drained by a
//! pool of competing consumers.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Card, Transaction, LedgerError, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::pipeline`] - Resolve, build, validate, persist and settle a payment
//!   - [`core::settlement`] - Simulated external authorization
//!   - [`core::registry`] - Account and card registration
//!   - [`core::queries`] - Paginated listing and per-account summaries
//!   - [`core::traits`] - The `LedgerStore` seam with in-memory and SQLite stores
//! - [`stream`] - Partitioned topic, producer and consumer pool
//! - [`api`] - HTTP routes and the GraphQL-style endpoint
//! - [`io`] - CSV input and summary output of the `ingest` command
//! - [`app`] - Assembly of the above for the `serve` and `ingest` commands
//!
//! # Transaction Lifecycle
//!
//! A transaction is persisted as **pending** before settlement and moves
//! exactly once to a terminal status:
//!
//! - **Completed**: settlement accepted the payment
//! - **Failed**: the amount exceeded the limit or the network failed
//!
//! Payments whose card cannot be resolved or that fail validation are
//! rejected before anything is written.

// Module declarations
pub mod api;
pub mod app;
pub mod cli;
pub mod core;
pub mod io;
pub mod stream;
pub mod types;

pub use app::Ledger;
pub use core::{LedgerPipeline, LedgerQueries, LedgerStore, MemoryStore, Registry, SqliteStore};
pub use io::write_summaries_csv;
pub use types::{
    Account, Card, CardPayload, ErrorKind, LedgerError, Transaction, TransactionStatus,
    TransactionSummary,
};
