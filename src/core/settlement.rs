//! Simulated external authorization
//!
//! The settlement engine decides the final status of a pending transaction.
//! It is the only component of the ledger with latency and randomness:
//!
//! 1. suspend for the configured latency (a `tokio::time::sleep`, no lock held)
//! 2. reject amounts above the configured ceiling (`AmountExceedsLimit`)
//! 3. fail a configured fraction of the rest as a transient network failure
//! 4. complete everything else
//!
//! # Randomness
//!
//! Random draws come from an injected [`RandomSource`]. The default source is
//! a `StdRng` that can be seeded from configuration so runs are reproducible.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{LedgerError, Transaction, TransactionStatus};

/// Per-transaction ceiling in minor units
pub const DEFAULT_AMOUNT_LIMIT: i64 = 100_000;

/// Largest configurable ceiling (10^12 minor units)
pub const MAX_AMOUNT_LIMIT: i64 = 1_000_000_000_000;

/// Fraction of transactions failed as transient network errors
pub const DEFAULT_FAILURE_RATE: f64 = 0.05;

/// Simulated authorization round-trip
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

/// Tunables of the settlement engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementConfig {
    /// Amounts strictly above this are rejected
    pub amount_limit: i64,

    /// Probability in `[0, 1]` of a transient failure
    pub failure_rate: f64,

    /// Time spent "talking to the authorizer"
    pub latency: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            amount_limit: DEFAULT_AMOUNT_LIMIT,
            failure_rate: DEFAULT_FAILURE_RATE,
            latency: DEFAULT_LATENCY,
        }
    }
}

/// Source of uniformly distributed samples in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// [`RandomSource`] backed by `StdRng`
#[derive(Debug)]
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    /// Source seeded from operating system entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible source
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for StdRandom {
    fn sample(&self) -> f64 {
        // A poisoned lock still holds a usable generator
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen::<f64>()
    }
}

/// Outcome of settling one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// Terminal status to record
    pub status: TransactionStatus,

    /// Why the transaction failed, `None` when completed
    pub reason: Option<LedgerError>,
}

impl Settlement {
    fn completed() -> Self {
        Self {
            status: TransactionStatus::Completed,
            reason: None,
        }
    }

    fn failed(reason: LedgerError) -> Self {
        Self {
            status: TransactionStatus::Failed,
            reason: Some(reason),
        }
    }
}

/// Decides the terminal status of pending transactions
///
/// Shared by every pipeline invocation; `settle` takes `&self` and holds no
/// lock across its suspension point.
pub struct SettlementEngine {
    config: SettlementConfig,
    random: Arc<dyn RandomSource>,
}

impl SettlementEngine {
    /// Engine drawing from an entropy-seeded `StdRng`
    pub fn new(config: SettlementConfig) -> Self {
        Self::with_random(config, Arc::new(StdRandom::from_entropy()))
    }

    /// Engine drawing from a `StdRng` seeded with `seed`
    pub fn seeded(config: SettlementConfig, seed: u64) -> Self {
        Self::with_random(config, Arc::new(StdRandom::seeded(seed)))
    }

    /// Engine drawing from a caller-supplied source
    pub fn with_random(config: SettlementConfig, random: Arc<dyn RandomSource>) -> Self {
        Self { config, random }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle a pending transaction
    ///
    /// Risk rejections and transient failures are not errors: they are
    /// reported as a `Failed` settlement carrying the reason.
    pub async fn settle(&self, transaction: &Transaction) -> Settlement {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if transaction.amount > self.config.amount_limit {
            return Settlement::failed(LedgerError::AmountExceedsLimit {
                amount: transaction.amount,
                limit: self.config.amount_limit,
            });
        }

        if self.random.sample() < self.config.failure_rate {
            return Settlement::failed(LedgerError::NetworkFailure {
                message: format!("authorizer unavailable for transaction {}", transaction.id),
            });
        }

        Settlement::completed()
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
