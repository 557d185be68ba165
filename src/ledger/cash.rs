//! Cash accounting: credits and debits against a user's balance.
//!
//! Both functions expect the caller to hold the user's lock inside an open
//! store transaction, and neither records an audit entry.

use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::db::repo;
use crate::error::{LedgerError, LedgerResult};
use crate::models::money;

fn validated(amount: Decimal) -> LedgerResult<Decimal> {
    let amount = money::cents(amount);
    if amount < Decimal::ZERO {
        return Err(LedgerError::invalid("amount cannot be negative"));
    }
    Ok(amount)
}

async fn current_balance(conn: &mut SqliteConnection, user_id: i64) -> LedgerResult<Decimal> {
    let user = repo::fetch_user(conn, user_id)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))?;
    Ok(user.balance)
}

/// Add `amount` to the balance and return the new balance.
pub async fn credit(conn: &mut SqliteConnection, user_id: i64, amount: Decimal) -> LedgerResult<Decimal> {
    let amount = validated(amount)?;
    let balance = current_balance(conn, user_id).await?;

    let new_balance = balance
        .checked_add(amount)
        .map(money::cents)
        .ok_or_else(|| LedgerError::invalid("balance would overflow"))?;
    repo::set_balance(conn, user_id, new_balance).await?;

    Ok(new_balance)
}

/// Take `amount` from the balance and return the new balance.
///
/// Fails with `InsufficientFunds` without writing anything when the balance
/// does not cover the amount.
pub async fn debit(conn: &mut SqliteConnection, user_id: i64, amount: Decimal) -> LedgerResult<Decimal> {
    let amount = validated(amount)?;
    let balance = current_balance(conn, user_id).await?;

    ensure_funds(balance, amount)?;

    let new_balance = money::cents(balance - amount);
    repo::set_balance(conn, user_id, new_balance).await?;

    Ok(new_balance)
}

/// Check that `balance` covers `required`.
pub fn ensure_funds(balance: Decimal, required: Decimal) -> LedgerResult<()> {
    if balance < required {
        return Err(LedgerError::InsufficientFunds { balance, required });
    }
    Ok(())
}
