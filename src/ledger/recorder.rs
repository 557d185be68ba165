//! Transaction recorder and log reconciliation.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db::repo;
use crate::error::LedgerResult;
use crate::models::{NewTransaction, Transaction};

/// Append an audit entry. Store errors propagate to the caller's transaction.
pub async fn record(conn: &mut SqliteConnection, entry: NewTransaction) -> LedgerResult<Transaction> {
    let transaction = repo::insert_transaction(conn, &entry).await?;
    Ok(transaction)
}

/// Consecutive entries whose balances do not chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationBreak {
    pub previous_id: i64,
    pub next_id: i64,
    pub previous_balance_after: Decimal,
    pub next_balance_before: Decimal,
}

/// Outcome of walking one user's log.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub user_id: i64,
    pub entries: usize,
    pub breaks: Vec<ReconciliationBreak>,

    /// `balance_after` of the newest entry
    pub ledger_balance: Option<Decimal>,

    pub current_balance: Decimal,
}

impl Reconciliation {
    /// Walk `log` (oldest first) and compare it with the current balance.
    pub fn check(user_id: i64, log: &[Transaction], current_balance: Decimal) -> Self {
        let breaks = log
            .windows(2)
            .filter(|pair| pair[0].balance_after != pair[1].balance_before)
            .map(|pair| ReconciliationBreak {
                previous_id: pair[0].id,
                next_id: pair[1].id,
                previous_balance_after: pair[0].balance_after,
                next_balance_before: pair[1].balance_before,
            })
            .collect();

        Self {
            user_id,
            entries: log.len(),
            breaks,
            ledger_balance: log.last().map(|t| t.balance_after),
            current_balance,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty()
            && self
                .ledger_balance
                .map_or(true, |balance| balance == self.current_balance)
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self
            .ledger_balance
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "user {}: {} entries, ledger {}, balance {}, {}",
            self.user_id,
            self.entries,
            ledger,
            self.current_balance,
            if self.is_consistent() { "OK" } else { "MISMATCH" }
        )?;
        for b in &self.breaks {
            write!(
                f,
                "\n  #{} after {} != #{} before {}",
                b.previous_id, b.previous_balance_after, b.next_id, b.next_balance_before
            )?;
        }
        Ok(())
    }
}
