//! Position model representing a user's holding in one instrument.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money;
use super::Instrument;
use crate::error::{LedgerError, LedgerResult};

/// Shares of one instrument held by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub user_id: i64,
    pub instrument_id: i64,

    /// Number of shares held, at least one while the position exists
    pub quantity: i64,

    /// Weighted-average cost per share, four decimal places
    pub average_cost: Decimal,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Add a lot bought at `price`, averaging the cost in. Leaves the
    /// position untouched when the new totals would overflow.
    pub fn add(&mut self, quantity: i64, price: Decimal) -> LedgerResult<()> {
        let new_quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::invalid("quantity too large"))?;
        self.average_cost = money::weighted_average(self.quantity, self.average_cost, quantity, price)
            .ok_or_else(|| LedgerError::invalid("position cost too large"))?;
        self.quantity = new_quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove shares. Average cost only moves on buys.
    pub fn reduce(&mut self, quantity: i64) {
        self.quantity -= quantity;
        self.updated_at = Utc::now();
    }

    /// Check if the position has been fully liquidated.
    pub fn is_closed(&self) -> bool {
        self.quantity <= 0
    }

    /// What the shares cost, truncated to cents.
    pub fn cost_basis(&self) -> Decimal {
        money::cents(Decimal::from(self.quantity).saturating_mul(self.average_cost))
    }
}

/// Result of removing shares from a position.
#[derive(Debug, Clone)]
pub enum PositionChange {
    /// Shares remain; the updated row
    Reduced(Position),
    /// The row was deleted
    Closed,
}

impl PositionChange {
    pub fn into_position(self) -> Option<Position> {
        match self {
            PositionChange::Reduced(position) => Some(position),
            PositionChange::Closed => None,
        }
    }
}

/// A position joined with its instrument and valued at the current price.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioEntry {
    #[serde(flatten)]
    pub position: Position,
    pub instrument: Instrument,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
}

impl PortfolioEntry {
    pub fn new(position: Position, instrument: Instrument) -> Self {
        let market_value = money::trade_value(position.quantity, instrument.price);
        let cost_basis = position.cost_basis();
        Self {
            unrealized_pnl: market_value.saturating_sub(cost_basis),
            market_value,
            cost_basis,
            position,
            instrument,
        }
    }
}

/// A user's whole portfolio with totals.
#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub user_id: i64,
    pub cash: Decimal,
    pub positions: Vec<PortfolioEntry>,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
}

impl Portfolio {
    pub fn new(user_id: i64, cash: Decimal, positions: Vec<PortfolioEntry>) -> Self {
        let market_value = positions
            .iter()
            .fold(Decimal::ZERO, |total, p| total.saturating_add(p.market_value));
        let cost_basis = positions
            .iter()
            .fold(Decimal::ZERO, |total, p| total.saturating_add(p.cost_basis));
        Self {
            user_id,
            cash,
            unrealized_pnl: market_value.saturating_sub(cost_basis),
            market_value,
            cost_basis,
            positions,
        }
    }
}
