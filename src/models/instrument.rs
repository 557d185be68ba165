//! Tradable stock with an externally supplied price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Listed instrument. The ledger only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub name: String,

    /// Last price per share
    pub price: Decimal,

    /// Day change in percent
    pub percent_change: Decimal,

    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Whether the instrument can be traded at its current price.
    pub fn is_tradable(&self) -> bool {
        self.price > Decimal::ZERO
    }
}
