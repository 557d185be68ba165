//! Row decoding for ledger tables.
//!
//! SQLite has no decimal type, so money columns are stored as TEXT and parsed
//! here into `Decimal`.

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::models::{AmountConfig, Instrument, PortfolioEntry, Position, Transaction, TransactionKind, User};

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse::<Decimal>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn kind(row: &SqliteRow, column: &str) -> Result<TransactionKind, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse::<TransactionKind>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            credential: row.try_get("credential")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            clabe: row.try_get("clabe")?,
            bank_account: row.try_get("bank_account")?,
            balance: decimal(row, "balance")?,
            registered_at: row.try_get("registered_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Instrument {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: decimal(row, "price")?,
            percent_change: decimal(row, "percent_change")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Position {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            instrument_id: row.try_get("instrument_id")?,
            quantity: row.try_get("quantity")?,
            average_cost: decimal(row, "average_cost")?,
            opened_at: row.try_get("opened_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Transaction {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: kind(row, "kind")?,
            instrument_id: row.try_get("instrument_id")?,
            quantity: row.try_get("quantity")?,
            amount: decimal(row, "amount")?,
            balance_before: decimal(row, "balance_before")?,
            balance_after: decimal(row, "balance_after")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for AmountConfig {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            amount: decimal(row, "amount")?,
            kind: kind(row, "kind")?,
            label: row.try_get("label")?,
        })
    }
}

/// Decode a `positions JOIN instruments` row selected with
/// [`super::repo::PORTFOLIO_COLUMNS`].
impl<'r> FromRow<'r, SqliteRow> for PortfolioEntry {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let position = Position::from_row(row)?;
        let instrument = Instrument {
            id: position.instrument_id,
            name: row.try_get("instrument_name")?,
            price: decimal(row, "instrument_price")?,
            percent_change: decimal(row, "instrument_percent_change")?,
            updated_at: row.try_get("instrument_updated_at")?,
        };
        Ok(PortfolioEntry::new(position, instrument))
    }
}
