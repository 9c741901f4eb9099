//! Shared fixtures for unit tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::memory_store::MemoryStore;
use super::pipeline::LedgerPipeline;
use super::registry::Registry;
use super::settlement::{SettlementConfig, SettlementEngine};
use super::traits::LedgerStore;
use crate::types::{Account, Card, CardPayload, Transaction, TransactionStatus};

pub const CARD_NUMBER: &str = "4111-1111-1111-1111";

/// Pending transaction for `account_id` with the given amount and category
pub fn sample_transaction(account_id: &str, amount: i64, category: &str) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: Uuid::new_v4().to_string(),
        account_id: account_id.to_string(),
        card_id: "card-1".to_string(),
        amount,
        merchant_name: "Coffee Shop".to_string(),
        merchant_city: None,
        merchant_country: None,
        category: category.to_string(),
        description: "Card payment at Coffee Shop".to_string(),
        status: TransactionStatus::Pending,
        timestamp: now,
        created_at: now,
        updated_at: now,
    }
}

/// Payload charging `amount` to [`CARD_NUMBER`]
pub fn sample_payload(amount: i64) -> CardPayload {
    CardPayload {
        card_number: CARD_NUMBER.to_string(),
        amount,
        merchant_name: "Coffee Shop".to_string(),
        merchant_city: None,
        merchant_country: None,
        category: "dining".to_string(),
        timestamp: "2024-01-15T10:30:00Z".to_string(),
    }
}

/// Settlement without latency and with a fixed failure rate
pub fn instant_settlement(failure_rate: f64) -> SettlementEngine {
    SettlementEngine::seeded(
        SettlementConfig {
            latency: Duration::ZERO,
            failure_rate,
            ..SettlementConfig::default()
        },
        7,
    )
}

/// In-memory store holding one account with an active [`CARD_NUMBER`] card
pub fn registered_store() -> (Arc<dyn LedgerStore>, Account, Card) {
    let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
    let registry = Registry::new(Arc::clone(&store));
    let account = registry.register_account("Ada", "ada@example.com").unwrap();
    let card = registry.register_card(&account.id, CARD_NUMBER, "visa").unwrap();
    (store, account, card)
}

/// Pipeline over [`registered_store`] that never fails settlement at random
pub fn reliable_pipeline() -> (LedgerPipeline, Arc<dyn LedgerStore>, Account, Card) {
    let (store, account, card) = registered_store();
    let pipeline = LedgerPipeline::new(Arc::clone(&store), Arc::new(instant_settlement(0.0)));
    (pipeline, store, account, card)
}
