//! Preset deposit and withdrawal amounts curated by an operator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransactionKind;

/// A fixed amount a user may deposit or withdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountConfig {
    pub id: i64,
    pub amount: Decimal,

    /// Either `Deposit` or `Withdraw`
    pub kind: TransactionKind,

    pub label: Option<String>,
}

impl AmountConfig {
    /// Whether this preset may be used for the given cash operation.
    pub fn applies_to(&self, kind: TransactionKind) -> bool {
        self.kind == kind
    }
}
