//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Storage abstraction shared by every component
//! - `memory_store` / `sqlite_store` - Storage implementations
//! - `resolver` - Card number to account/card resolution
//! - `builder` - Transaction construction from card payloads
//! - `validator` - Structural validation rules
//! - `settlement` - Simulated external authorization
//! - `pipeline` - Intake and settlement orchestration
//! - `registry` - Account and card registration
//! - `queries` - Paginated listing and per-account summary

pub mod builder;
pub mod memory_store;
pub mod pipeline;
pub mod queries;
pub mod registry;
pub mod resolver;
pub mod settlement;
pub mod sqlite_store;
pub mod traits;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use memory_store::MemoryStore;
pub use pipeline::LedgerPipeline;
pub use queries::{LedgerQueries, Pagination, TransactionPage};
pub use registry::Registry;
pub use resolver::{CardResolver, ResolvedCard};
pub use settlement::{RandomSource, Settlement, SettlementConfig, SettlementEngine, StdRandom};
pub use sqlite_store::{PoolConfig, SqliteStore};
pub use traits::LedgerStore;
