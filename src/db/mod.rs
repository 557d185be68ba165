//! Ledger store: SQLite schema, connection pool and read/seed queries.
//!
//! Tables:
//! - users: account holders and their cash balance
//! - instruments: tradable stocks with an externally supplied price
//! - positions: holdings per (user, instrument)
//! - transactions: append-only audit log
//! - amount_configs: preset deposit/withdraw amounts

pub mod repo;
mod rows;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    money, AmountConfig, Instrument, NewUser, Portfolio, ProfileUpdate, Transaction, TransactionKind, User,
};

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with the default pool size.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 5).await
    }

    /// Open (creating if needed) the database and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                credential TEXT NOT NULL,
                name TEXT,
                address TEXT,
                clabe TEXT,
                bank_account TEXT,
                balance TEXT NOT NULL DEFAULT '0.00',
                registered_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instruments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                price TEXT NOT NULL,
                percent_change TEXT NOT NULL DEFAULT '0.00',
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                instrument_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                average_cost TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, instrument_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (instrument_id) REFERENCES instruments(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('DEPOSIT', 'WITHDRAW', 'BUY', 'SELL')),
                instrument_id INTEGER,
                quantity INTEGER,
                amount TEXT NOT NULL,
                balance_before TEXT NOT NULL,
                balance_after TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (instrument_id) REFERENCES instruments(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS amount_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('DEPOSIT', 'WITHDRAW')),
                label TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // The audit log is append-only
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS transactions_no_update
            BEFORE UPDATE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transactions are append-only');
            END
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS transactions_no_delete
            BEFORE DELETE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transactions are append-only');
            END
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_user ON positions(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Users ====================

    /// Register a user with an opening balance.
    pub async fn create_user(&self, new_user: &NewUser) -> LedgerResult<User> {
        if new_user.opening_balance < Decimal::ZERO {
            return Err(LedgerError::invalid("opening balance cannot be negative"));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, credential, name, balance, registered_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.credential)
        .bind(new_user.name.as_deref())
        .bind(money::cents(new_user.opening_balance).to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> LedgerResult<User> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_user(&mut conn, user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    pub async fn list_user_ids(&self) -> LedgerResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Update mutable profile fields and return the fresh user.
    pub async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> LedgerResult<User> {
        let mut conn = self.pool.acquire().await?;
        if !update.is_empty() && !repo::update_profile(&mut conn, user_id, update).await? {
            return Err(LedgerError::UserNotFound(user_id));
        }

        repo::fetch_user(&mut conn, user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    // ==================== Instruments ====================

    pub async fn create_instrument(
        &self,
        name: &str,
        price: Decimal,
        percent_change: Decimal,
    ) -> LedgerResult<Instrument> {
        if price < Decimal::ZERO {
            return Err(LedgerError::invalid("price cannot be negative"));
        }

        let instrument = sqlx::query_as::<_, Instrument>(
            r#"
            INSERT INTO instruments (name, price, percent_change, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(money::cents(price).to_string())
        .bind(money::cents(percent_change).to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(instrument)
    }

    /// Record an externally observed price.
    pub async fn set_instrument_price(
        &self,
        instrument_id: i64,
        price: Decimal,
        percent_change: Decimal,
    ) -> LedgerResult<Instrument> {
        if price < Decimal::ZERO {
            return Err(LedgerError::invalid("price cannot be negative"));
        }

        sqlx::query_as::<_, Instrument>(
            "UPDATE instruments SET price = ?, percent_change = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(money::cents(price).to_string())
        .bind(money::cents(percent_change).to_string())
        .bind(Utc::now())
        .bind(instrument_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::InstrumentNotFound(instrument_id))
    }

    pub async fn get_instrument(&self, instrument_id: i64) -> LedgerResult<Instrument> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_instrument(&mut conn, instrument_id)
            .await?
            .ok_or(LedgerError::InstrumentNotFound(instrument_id))
    }

    pub async fn list_instruments(&self) -> LedgerResult<Vec<Instrument>> {
        let instruments = sqlx::query_as::<_, Instrument>("SELECT * FROM instruments ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(instruments)
    }

    // ==================== Amount configs ====================

    pub async fn create_amount_config(
        &self,
        amount: Decimal,
        kind: TransactionKind,
        label: Option<&str>,
    ) -> LedgerResult<AmountConfig> {
        if !matches!(kind, TransactionKind::Deposit | TransactionKind::Withdraw) {
            return Err(LedgerError::invalid("amount configs are either DEPOSIT or WITHDRAW"));
        }
        let amount = money::cents(amount);
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("configured amount must be positive"));
        }

        let config = sqlx::query_as::<_, AmountConfig>(
            "INSERT INTO amount_configs (amount, kind, label) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(amount.to_string())
        .bind(kind.as_str())
        .bind(label)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn list_amount_configs(&self, kind: Option<TransactionKind>) -> LedgerResult<Vec<AmountConfig>> {
        let configs = match kind {
            Some(kind) => {
                sqlx::query_as::<_, AmountConfig>("SELECT * FROM amount_configs WHERE kind = ? ORDER BY id")
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, AmountConfig>("SELECT * FROM amount_configs ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(configs)
    }

    // ==================== Portfolio & history ====================

    /// Positions of a user joined with instrument data and valued at the
    /// current price.
    pub async fn get_portfolio(&self, user_id: i64) -> LedgerResult<Portfolio> {
        let mut conn = self.pool.acquire().await?;
        let user = repo::fetch_user(&mut conn, user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;
        let entries = repo::fetch_portfolio_entries(&mut conn, user_id).await?;

        Ok(Portfolio::new(user_id, user.balance, entries))
    }

    /// Newest-first transaction history.
    pub async fn list_transactions(&self, user_id: i64, limit: i64) -> LedgerResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        if repo::fetch_user(&mut conn, user_id).await?.is_none() {
            return Err(LedgerError::UserNotFound(user_id));
        }

        let transactions = repo::fetch_transactions(&mut conn, user_id, limit.max(0)).await?;
        Ok(transactions)
    }

    /// Get the connection pool (for advanced queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
