//! Position accounting: weighted-average cost on buys, liquidation on sells.

use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::db::repo;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{money, Position, PositionChange};

/// Open a position or add to an existing one at `trade_price`.
pub async fn open_or_increase(
    conn: &mut SqliteConnection,
    user_id: i64,
    instrument_id: i64,
    quantity: i64,
    trade_price: Decimal,
) -> LedgerResult<Position> {
    if quantity <= 0 {
        return Err(LedgerError::invalid("quantity must be positive"));
    }

    match repo::fetch_position(conn, user_id, instrument_id).await? {
        Some(mut position) => {
            position.add(quantity, trade_price)?;
            repo::update_position(conn, &position).await?;
            Ok(position)
        }
        None => {
            let average_cost = money::truncate(trade_price, money::COST_DP);
            let position = repo::insert_position(conn, user_id, instrument_id, quantity, average_cost).await?;
            Ok(position)
        }
    }
}

/// Remove `quantity` shares, deleting the position when none remain.
pub async fn decrease_or_close(
    conn: &mut SqliteConnection,
    user_id: i64,
    instrument_id: i64,
    quantity: i64,
) -> LedgerResult<PositionChange> {
    if quantity <= 0 {
        return Err(LedgerError::invalid("quantity must be positive"));
    }

    let mut position = repo::fetch_position(conn, user_id, instrument_id)
        .await?
        .ok_or(LedgerError::NoSuchPosition { user_id, instrument_id })?;

    ensure_holdings(&position, quantity)?;

    position.reduce(quantity);
    if position.is_closed() {
        repo::delete_position(conn, position.id).await?;
        return Ok(PositionChange::Closed);
    }

    repo::update_position(conn, &position).await?;
    Ok(PositionChange::Reduced(position))
}

/// Check that `position` holds at least `quantity` shares.
pub fn ensure_holdings(position: &Position, quantity: i64) -> LedgerResult<()> {
    if quantity > position.quantity {
        return Err(LedgerError::InsufficientHoldings {
            held: position.quantity,
            requested: quantity,
        });
    }
    Ok(())
}
