//! SQLite-backed ledger storage
//!
//! Accounts, cards and transactions live in three related tables. The schema
//! repeats the transaction invariants as CHECK constraints so that a row that
//! slipped past the validator is still refused at the storage boundary.
//!
//! # Connection Pool
//!
//! Connections come from a bounded r2d2 pool: at most `max_open` connections
//! exist, and idle connections above `max_idle` are closed after
//! [`IDLE_TIMEOUT`]. Reads run concurrently on separate connections (the file
//! is opened in WAL mode). Check-then-write sequences run inside an
//! `IMMEDIATE` transaction, so two writers never interleave between the check
//! and the write. No connection is held across an `.await`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{info, warn};

use super::traits::LedgerStore;
use crate::types::{Account, Card, LedgerError, Transaction, TransactionStatus};

/// Default upper bound of open connections
pub const DEFAULT_MAX_OPEN: u32 = 25;

/// Default number of idle connections kept open
pub const DEFAULT_MAX_IDLE: u32 = 25;

/// Idle connections above `max_idle` are closed after this long
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Connections are recycled after this long
pub const MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// How long a writer waits for the database lock
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Sizing of the connection pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound of open connections
    pub max_open: u32,

    /// Idle connections kept open (capped at `max_open`)
    pub max_idle: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: DEFAULT_MAX_OPEN,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

impl PoolConfig {
    /// Create a new PoolConfig
    ///
    /// A zero `max_open` is logged and replaced by the default; `max_idle`
    /// above `max_open` is capped.
    pub fn new(max_open: u32, max_idle: u32) -> Self {
        let max_open = if max_open == 0 {
            warn!(
                "Invalid db_max_open (0), using default ({})",
                DEFAULT_MAX_OPEN
            );
            DEFAULT_MAX_OPEN
        } else {
            max_open
        };

        Self {
            max_open,
            max_idle: max_idle.min(max_open),
        }
    }
}

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    card_number TEXT NOT NULL,
    card_type TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_cards_active_number
    ON cards(card_number) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    card_id TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    merchant_name TEXT NOT NULL,
    merchant_city TEXT,
    merchant_country TEXT,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_transactions_account
    ON transactions(account_id, timestamp);
";

const TRANSACTION_COLUMNS: &str = "id, account_id, card_id, amount, merchant_name, merchant_city, \
     merchant_country, category, description, status, timestamp, created_at, updated_at";

/// SQLite implementation of [`LedgerStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (connections, idle) = self.pool_state();
        f.debug_struct("SqliteStore")
            .field("max_open", &self.max_open())
            .field("connections", &connections)
            .field("idle", &idle)
            .finish()
    }
}

type SqliteConnection = PooledConnection<SqliteConnectionManager>;

impl SqliteStore {
    /// Open (or create) a database file with a default-sized pool
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        Self::open_with(path, PoolConfig::default())
    }

    /// Open (or create) a database file and apply the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Database file
    /// * `config` - Bounds of the connection pool
    pub fn open_with(path: &Path, config: PoolConfig) -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = Pool::builder()
            .max_size(config.max_open)
            .min_idle(Some(config.max_idle))
            .idle_timeout(Some(IDLE_TIMEOUT))
            .max_lifetime(Some(MAX_LIFETIME))
            .build(manager)?;

        let store = Self { pool };
        store.conn()?.execute_batch("PRAGMA journal_mode=WAL;")?;
        store.migrate()?;
        info!(
            path = %path.display(),
            max_open = config.max_open,
            max_idle = config.max_idle,
            "sqlite pool ready"
        );
        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// An in-memory database lives and dies with its connection, so the pool
    /// holds exactly one connection that is never recycled.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;

        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    /// Current pool occupancy: (open connections, idle connections)
    pub fn pool_state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }

    /// Upper bound of open connections
    pub fn max_open(&self) -> u32 {
        self.pool.max_size()
    }

    fn migrate(&self) -> Result<(), LedgerError> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<SqliteConnection, LedgerError> {
        Ok(self.pool.get()?)
    }
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys=ON; PRAGMA busy_timeout={};",
        BUSY_TIMEOUT_MS
    ))
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_time(row, 3)?,
        updated_at: parse_time(row, 4)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        account_id: row.get(1)?,
        card_number: row.get(2)?,
        card_type: row.get(3)?,
        active: row.get(4)?,
        created_at: parse_time(row, 5)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let status: String = row.get(9)?;
    let status = status
        .parse::<TransactionStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, e.into()))?;

    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        card_id: row.get(2)?,
        amount: row.get(3)?,
        merchant_name: row.get(4)?,
        merchant_city: row.get(5)?,
        merchant_country: row.get(6)?,
        category: row.get(7)?,
        description: row.get(8)?,
        status,
        timestamp: parse_time(row, 10)?,
        created_at: parse_time(row, 11)?,
        updated_at: parse_time(row, 12)?,
    })
}

fn select_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>, LedgerError> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], transaction_from_row)
        .optional()?)
}

impl LedgerStore for SqliteStore {
    fn create_account(&self, account: &Account) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: Option<String> = tx
            .query_row(
                "SELECT id FROM accounts WHERE email = ?1",
                params![account.email],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(LedgerError::DuplicateContact {
                email: account.email.clone(),
            });
        }

        tx.execute(
            "INSERT INTO accounts (id, name, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.name,
                account.email,
                format_time(&account.created_at),
                format_time(&account.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, email, created_at, updated_at FROM accounts WHERE id = ?1",
            params![account_id],
            account_from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, created_at, updated_at FROM accounts ORDER BY created_at, id",
        )?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    fn create_card(&self, card: &Card) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let owner: Option<String> = tx
            .query_row(
                "SELECT id FROM accounts WHERE id = ?1",
                params![card.account_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.is_none() {
            return Err(LedgerError::account_not_found(&card.account_id));
        }

        if card.active {
            let active: Option<String> = tx
                .query_row(
                    "SELECT id FROM cards WHERE card_number = ?1 AND is_active = 1",
                    params![card.card_number],
                    |row| row.get(0),
                )
                .optional()?;
            if active.is_some() {
                return Err(LedgerError::DuplicateCard {
                    card_number: card.card_number.clone(),
                });
            }
        }

        tx.execute(
            "INSERT INTO cards (id, account_id, card_number, card_type, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                card.id,
                card.account_id,
                card.card_number,
                card.card_type,
                card.active,
                format_time(&card.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn cards_by_number(&self, card_number: &str) -> Result<Vec<Card>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, card_number, card_type, is_active, created_at
             FROM cards WHERE card_number = ?1 ORDER BY created_at",
        )?;
        let cards = stmt
            .query_map(params![card_number], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn deactivate_card(&self, card_number: &str) -> Result<Card, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let card = tx
            .query_row(
                "SELECT id, account_id, card_number, card_type, is_active, created_at
                 FROM cards WHERE card_number = ?1 AND is_active = 1",
                params![card_number],
                card_from_row,
            )
            .optional()?
            .ok_or_else(|| LedgerError::card_not_found(card_number))?;

        tx.execute(
            "UPDATE cards SET is_active = 0 WHERE id = ?1",
            params![card.id],
        )?;
        tx.commit()?;
        Ok(Card {
            active: false,
            ..card
        })
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_transaction(&tx, &transaction.id)?.is_some() {
            return Err(LedgerError::DuplicateTransaction {
                id: transaction.id.clone(),
            });
        }

        let sql = format!(
            "INSERT INTO transactions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            TRANSACTION_COLUMNS
        );
        tx.execute(
            &sql,
            params![
                transaction.id,
                transaction.account_id,
                transaction.card_id,
                transaction.amount,
                transaction.merchant_name,
                transaction.merchant_city,
                transaction.merchant_country,
                transaction.category,
                transaction.description,
                transaction.status.as_str(),
                format_time(&transaction.timestamp),
                format_time(&transaction.created_at),
                format_time(&transaction.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn update_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current =
            select_transaction(&tx, id)?.ok_or_else(|| LedgerError::transaction_not_found(id))?;
        if !current.status.can_transition_to(status) {
            return Err(LedgerError::invalid_transition(id, current.status, status));
        }

        tx.execute(
            "UPDATE transactions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'pending'",
            params![status.as_str(), format_time(&updated_at), id],
        )?;
        tx.commit()?;
        Ok(Transaction {
            status,
            updated_at,
            ..current
        })
    }

    fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        let conn = self.conn()?;
        select_transaction(&conn, id)?.ok_or_else(|| LedgerError::transaction_not_found(id))
    }

    fn transactions_for_account(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE account_id = ?1
             ORDER BY timestamp DESC, created_at DESC, id LIMIT ?2 OFFSET ?3",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(
                params![account_id, limit as i64, offset as i64],
                transaction_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transactions)
    }

    fn transactions_with_status(
        &self,
        account_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE account_id = ?1 AND status = ?2",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params![account_id, status.as_str()], transaction_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transactions)
    }

    fn transaction_count(&self) -> Result<usize, LedgerError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
