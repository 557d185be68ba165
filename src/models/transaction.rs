//! Append-only audit record of every balance change.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Instrument;

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Buy,
    Sell,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAW" => Ok(Self::Withdraw),
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub instrument_id: Option<i64>,
    pub quantity: Option<i64>,

    /// Cash moved, always non-negative; `kind` gives the direction
    pub amount: Decimal,

    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a transaction about to be appended.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub instrument_id: Option<i64>,
    pub quantity: Option<i64>,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
}

impl NewTransaction {
    /// Cash-only entry for deposits and withdrawals.
    pub fn cash(
        user_id: i64,
        kind: TransactionKind,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
    ) -> Self {
        let verb = match kind {
            TransactionKind::Withdraw => "Withdrawal",
            _ => "Deposit",
        };
        Self {
            user_id,
            kind,
            instrument_id: None,
            quantity: None,
            amount,
            balance_before,
            balance_after,
            description: format!("{} of ${}", verb, amount),
        }
    }

    /// Trade entry for buys and sells, priced at the instrument's current
    /// price.
    pub fn trade(
        user_id: i64,
        kind: TransactionKind,
        instrument: &Instrument,
        quantity: i64,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
    ) -> Self {
        let verb = match kind {
            TransactionKind::Sell => "Sell",
            _ => "Buy",
        };
        Self {
            user_id,
            kind,
            instrument_id: Some(instrument.id),
            quantity: Some(quantity),
            amount,
            balance_before,
            balance_after,
            description: format!("{} {} {} @ ${}", verb, quantity, instrument.name, instrument.price),
        }
    }
}
