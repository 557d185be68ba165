//! Repository functions over an explicit connection handle.
//!
//! Callers pass either a pooled connection or an open `sqlx::Transaction`;
//! nothing here begins or commits a transaction on its own.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::models::{AmountConfig, Instrument, NewTransaction, PortfolioEntry, Position, ProfileUpdate, Transaction, User};

/// Columns selected when joining positions with their instrument.
pub const PORTFOLIO_COLUMNS: &str = r#"
    p.id AS id,
    p.user_id AS user_id,
    p.instrument_id AS instrument_id,
    p.quantity AS quantity,
    p.average_cost AS average_cost,
    p.opened_at AS opened_at,
    p.updated_at AS updated_at,
    i.name AS instrument_name,
    i.price AS instrument_price,
    i.percent_change AS instrument_percent_change,
    i.updated_at AS instrument_updated_at
"#;

// ==================== Users ====================

/// Take the write lock on a user's row and return its current state.
///
/// The no-op update is the first statement of the caller's transaction, so
/// the store's write lock is held before any balance is read and stays held
/// until commit or rollback. Returns `None` for an unknown user.
pub async fn lock_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    let touched = sqlx::query("UPDATE users SET balance = balance WHERE id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if touched.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_user(conn, user_id).await
}

pub async fn fetch_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn set_balance(conn: &mut SqliteConnection, user_id: i64, balance: Decimal) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
        .bind(balance.to_string())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Apply a partial profile update. Returns false for an unknown user.
pub async fn update_profile(
    conn: &mut SqliteConnection,
    user_id: i64,
    update: &ProfileUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            address = COALESCE(?, address),
            clabe = COALESCE(?, clabe),
            bank_account = COALESCE(?, bank_account)
        WHERE id = ?
        "#,
    )
    .bind(update.name.as_deref())
    .bind(update.address.as_deref())
    .bind(update.clabe.as_deref())
    .bind(update.bank_account.as_deref())
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ==================== Instruments ====================

pub async fn fetch_instrument(
    conn: &mut SqliteConnection,
    instrument_id: i64,
) -> Result<Option<Instrument>, sqlx::Error> {
    sqlx::query_as::<_, Instrument>("SELECT * FROM instruments WHERE id = ?")
        .bind(instrument_id)
        .fetch_optional(&mut *conn)
        .await
}

// ==================== Positions ====================

pub async fn fetch_position(
    conn: &mut SqliteConnection,
    user_id: i64,
    instrument_id: i64,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as::<_, Position>("SELECT * FROM positions WHERE user_id = ? AND instrument_id = ?")
        .bind(user_id)
        .bind(instrument_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_position(
    conn: &mut SqliteConnection,
    user_id: i64,
    instrument_id: i64,
    quantity: i64,
    average_cost: Decimal,
) -> Result<Position, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Position>(
        r#"
        INSERT INTO positions (user_id, instrument_id, quantity, average_cost, opened_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(instrument_id)
    .bind(quantity)
    .bind(average_cost.to_string())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

/// Persist quantity and average cost of an existing position.
pub async fn update_position(conn: &mut SqliteConnection, position: &Position) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE positions SET quantity = ?, average_cost = ?, updated_at = ? WHERE id = ?")
        .bind(position.quantity)
        .bind(position.average_cost.to_string())
        .bind(position.updated_at)
        .bind(position.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn delete_position(conn: &mut SqliteConnection, position_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM positions WHERE id = ?")
        .bind(position_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// All positions of a user joined with instrument data, ordered by instrument.
pub async fn fetch_portfolio_entries(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<PortfolioEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM positions p JOIN instruments i ON i.id = p.instrument_id WHERE p.user_id = ? ORDER BY i.name",
        PORTFOLIO_COLUMNS
    );
    sqlx::query_as::<_, PortfolioEntry>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

// ==================== Transactions ====================

/// Append a transaction row.
pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    entry: &NewTransaction,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            user_id, kind, instrument_id, quantity, amount,
            balance_before, balance_after, description, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.kind.as_str())
    .bind(entry.instrument_id)
    .bind(entry.quantity)
    .bind(entry.amount.to_string())
    .bind(entry.balance_before.to_string())
    .bind(entry.balance_after.to_string())
    .bind(&entry.description)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

/// Newest-first history of a user.
pub async fn fetch_transactions(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

/// Oldest-first history of a user, in insertion order.
pub async fn fetch_transactions_chronological(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE user_id = ? ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

// ==================== Amount configs ====================

pub async fn fetch_amount_config(
    conn: &mut SqliteConnection,
    config_id: i64,
) -> Result<Option<AmountConfig>, sqlx::Error> {
    sqlx::query_as::<_, AmountConfig>("SELECT * FROM amount_configs WHERE id = ?")
        .bind(config_id)
        .fetch_optional(&mut *conn)
        .await
}
