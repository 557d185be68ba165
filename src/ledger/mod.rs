//! Ledger core: buy, sell, deposit and withdraw as atomic units.
//!
//! Every operation follows the same discipline:
//! 1. validate the request without touching the store
//! 2. take the user's lock, then open a store transaction whose first
//!    statement write-locks the user's row
//! 3. re-read balance and position inside the transaction
//! 4. apply position, cash and audit changes, then commit
//!
//! Returning early from step 2 onward drops the transaction, which rolls it
//! back, so a failed operation leaves no trace.

pub mod cash;
pub mod locks;
pub mod positions;
pub mod recorder;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection};
use tracing::{error, info, warn};

use crate::db::{repo, Database};
use crate::error::{ErrorKind, LedgerError, LedgerResult};
use crate::models::{money, Instrument, NewTransaction, Position, Transaction, TransactionKind, User};

pub use locks::{LockTable, UserLockGuard};
pub use recorder::Reconciliation;

/// Buy or sell request.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRequest {
    pub user_id: i64,
    pub instrument_id: i64,
    pub quantity: i64,
}

/// Deposit or withdraw request referencing a preset amount.
#[derive(Debug, Clone, Deserialize)]
pub struct CashRequest {
    pub user_id: i64,
    pub config_id: i64,
}

/// Result of a buy or sell.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,

    /// Position after the trade; `None` once fully sold
    pub position: Option<Position>,

    pub transaction: Transaction,
}

/// Result of a deposit or withdrawal.
#[derive(Debug, Clone, Serialize)]
pub struct CashReceipt {
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub transaction: Transaction,
}

/// Business operation orchestrator.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    locks: LockTable,
}

impl Ledger {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: LockTable::new(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Buy `quantity` shares at the instrument's current price.
    pub async fn buy(&self, order: &TradeRequest) -> LedgerResult<TradeReceipt> {
        let result = self.execute_buy(order).await;
        match &result {
            Ok(receipt) => info!(
                user_id = order.user_id,
                instrument_id = order.instrument_id,
                quantity = order.quantity,
                cost = %receipt.amount,
                balance = %receipt.balance_after,
                "Buy executed"
            ),
            Err(e) => log_rejection("buy", order.user_id, e),
        }
        result
    }

    /// Sell `quantity` shares at the instrument's current price.
    pub async fn sell(&self, order: &TradeRequest) -> LedgerResult<TradeReceipt> {
        let result = self.execute_sell(order).await;
        match &result {
            Ok(receipt) => info!(
                user_id = order.user_id,
                instrument_id = order.instrument_id,
                quantity = order.quantity,
                proceeds = %receipt.amount,
                balance = %receipt.balance_after,
                closed = receipt.position.is_none(),
                "Sell executed"
            ),
            Err(e) => log_rejection("sell", order.user_id, e),
        }
        result
    }

    /// Credit a preset deposit amount.
    pub async fn deposit(&self, request: &CashRequest) -> LedgerResult<CashReceipt> {
        self.move_cash(request, TransactionKind::Deposit).await
    }

    /// Debit a preset withdrawal amount.
    pub async fn withdraw(&self, request: &CashRequest) -> LedgerResult<CashReceipt> {
        self.move_cash(request, TransactionKind::Withdraw).await
    }

    /// Check that a user's transaction log chains and matches the balance.
    pub async fn reconcile(&self, user_id: i64) -> LedgerResult<Reconciliation> {
        let guard = self.locks.acquire(user_id).await;
        let mut conn = self.db.pool().acquire().await?;

        let user = match repo::fetch_user(&mut conn, user_id).await? {
            Some(user) => user,
            None => {
                self.locks.discard(user_id, guard);
                return Err(LedgerError::UserNotFound(user_id));
            }
        };
        let log = repo::fetch_transactions_chronological(&mut conn, user_id).await?;

        Ok(Reconciliation::check(user_id, &log, user.balance))
    }

    /// Take the user's lock, open a store transaction and write-lock the
    /// user's row as its first statement.
    ///
    /// On failure the lock entry is discarded so ids that match no user do
    /// not accumulate in the lock table.
    async fn begin_locked(
        &self,
        user_id: i64,
    ) -> LedgerResult<(UserLockGuard, sqlx::Transaction<'static, Sqlite>, User)> {
        let guard = self.locks.acquire(user_id).await;

        let locked = async {
            let mut tx = self.db.pool().begin().await?;
            let user = repo::lock_user(&mut tx, user_id)
                .await?
                .ok_or(LedgerError::UserNotFound(user_id))?;
            Ok::<_, LedgerError>((tx, user))
        }
        .await;

        match locked {
            Ok((tx, user)) => Ok((guard, tx, user)),
            Err(e) => {
                self.locks.discard(user_id, guard);
                Err(e)
            }
        }
    }

    async fn execute_buy(&self, order: &TradeRequest) -> LedgerResult<TradeReceipt> {
        validate_quantity(order.quantity)?;

        let (_guard, mut tx, user) = self.begin_locked(order.user_id).await?;
        let instrument = tradable_instrument(&mut tx, order.instrument_id).await?;

        let cost = money::checked_trade_value(order.quantity, instrument.price)
            .ok_or_else(|| LedgerError::invalid("quantity too large"))?;
        cash::ensure_funds(user.balance, cost)?;

        let position = positions::open_or_increase(
            &mut tx,
            user.id,
            instrument.id,
            order.quantity,
            instrument.price,
        )
        .await?;
        let balance_after = cash::debit(&mut tx, user.id, cost).await?;
        let transaction = recorder::record(
            &mut tx,
            NewTransaction::trade(
                user.id,
                TransactionKind::Buy,
                &instrument,
                order.quantity,
                cost,
                user.balance,
                balance_after,
            ),
        )
        .await?;

        tx.commit().await?;

        Ok(TradeReceipt {
            amount: cost,
            balance_before: user.balance,
            balance_after,
            position: Some(position),
            transaction,
        })
    }

    async fn execute_sell(&self, order: &TradeRequest) -> LedgerResult<TradeReceipt> {
        validate_quantity(order.quantity)?;

        let (_guard, mut tx, user) = self.begin_locked(order.user_id).await?;
        // A holding can always be sold, even once its price has dropped to zero.
        let instrument = repo::fetch_instrument(&mut tx, order.instrument_id)
            .await?
            .ok_or(LedgerError::InstrumentNotFound(order.instrument_id))?;

        let held = repo::fetch_position(&mut tx, user.id, instrument.id)
            .await?
            .ok_or(LedgerError::NoSuchPosition {
                user_id: user.id,
                instrument_id: instrument.id,
            })?;
        positions::ensure_holdings(&held, order.quantity)?;

        let proceeds = money::checked_trade_value(order.quantity, instrument.price)
            .ok_or_else(|| LedgerError::invalid("quantity too large"))?;

        let change = positions::decrease_or_close(&mut tx, user.id, instrument.id, order.quantity).await?;
        let balance_after = cash::credit(&mut tx, user.id, proceeds).await?;
        let transaction = recorder::record(
            &mut tx,
            NewTransaction::trade(
                user.id,
                TransactionKind::Sell,
                &instrument,
                order.quantity,
                proceeds,
                user.balance,
                balance_after,
            ),
        )
        .await?;

        tx.commit().await?;

        Ok(TradeReceipt {
            amount: proceeds,
            balance_before: user.balance,
            balance_after,
            position: change.into_position(),
            transaction,
        })
    }

    async fn move_cash(&self, request: &CashRequest, kind: TransactionKind) -> LedgerResult<CashReceipt> {
        let result = self.execute_cash(request, kind).await;
        match &result {
            Ok(receipt) => info!(
                user_id = request.user_id,
                config_id = request.config_id,
                kind = %kind,
                amount = %receipt.amount,
                balance = %receipt.balance_after,
                "Cash movement executed"
            ),
            Err(e) => log_rejection(kind.as_str(), request.user_id, e),
        }
        result
    }

    async fn execute_cash(&self, request: &CashRequest, kind: TransactionKind) -> LedgerResult<CashReceipt> {
        let mut conn = self.db.pool().acquire().await?;
        let config = repo::fetch_amount_config(&mut conn, request.config_id)
            .await?
            .filter(|config| config.applies_to(kind))
            .ok_or(LedgerError::NoSuchConfig {
                config_id: request.config_id,
                kind: kind.as_str(),
            })?;
        drop(conn);
        let amount = money::cents(config.amount);

        let (_guard, mut tx, user) = self.begin_locked(request.user_id).await?;

        let balance_after = match kind {
            TransactionKind::Withdraw => cash::debit(&mut tx, user.id, amount).await?,
            _ => cash::credit(&mut tx, user.id, amount).await?,
        };
        let transaction = recorder::record(
            &mut tx,
            NewTransaction::cash(user.id, kind, amount, user.balance, balance_after),
        )
        .await?;

        tx.commit().await?;

        Ok(CashReceipt {
            amount,
            balance_before: user.balance,
            balance_after,
            transaction,
        })
    }
}

fn validate_quantity(quantity: i64) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::invalid(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

/// Buys need a positive price; a zero price means no market to buy from.
async fn tradable_instrument(conn: &mut SqliteConnection, instrument_id: i64) -> LedgerResult<Instrument> {
    let instrument = repo::fetch_instrument(conn, instrument_id)
        .await?
        .ok_or(LedgerError::InstrumentNotFound(instrument_id))?;

    if !instrument.is_tradable() {
        return Err(LedgerError::invalid(format!(
            "instrument {} has no tradable price",
            instrument.name
        )));
    }
    Ok(instrument)
}

fn log_rejection(operation: &str, user_id: i64, err: &LedgerError) {
    if err.kind() == ErrorKind::StoreFailure {
        error!(operation, user_id, error = %err, "Ledger operation failed");
    } else {
        warn!(operation, user_id, code = err.code(), error = %err, "Ledger operation rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{new_user, test_db};
    use crate::models::{AmountConfig, User};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ledger: Ledger,
        user: User,
        acme: Instrument,
    }

    async fn fixture(balance: Decimal, price: Decimal) -> Fixture {
        let (dir, db) = test_db().await;
        let user = db.create_user(&new_user("ana@example.com", balance)).await.unwrap();
        let acme = db.create_instrument("ACME", price, dec!(0)).await.unwrap();
        Fixture {
            _dir: dir,
            ledger: Ledger::new(db),
            user,
            acme,
        }
    }

    impl Fixture {
        fn order(&self, quantity: i64) -> TradeRequest {
            TradeRequest {
                user_id: self.user.id,
                instrument_id: self.acme.id,
                quantity,
            }
        }

        async fn amount(&self, amount: Decimal, kind: TransactionKind) -> AmountConfig {
            self.ledger.db().create_amount_config(amount, kind, None).await.unwrap()
        }

        async fn balance(&self) -> Decimal {
            self.ledger.db().get_user(self.user.id).await.unwrap().balance
        }

        async fn log(&self) -> Vec<Transaction> {
            self.ledger.db().list_transactions(self.user.id, 100).await.unwrap()
        }

        async fn set_price(&self, price: Decimal) {
            self.ledger
                .db()
                .set_instrument_price(self.acme.id, price, dec!(0))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_buy_debits_and_records() {
        let f = fixture(dec!(1000), dec!(33.33)).await;

        let receipt = f.ledger.buy(&f.order(3)).await.unwrap();

        assert_eq!(receipt.amount, dec!(99.99));
        assert_eq!(receipt.balance_before, dec!(1000));
        assert_eq!(receipt.balance_after, dec!(900.01));
        let position = receipt.position.unwrap();
        assert_eq!(position.quantity, 3);
        assert_eq!(position.average_cost, dec!(33.33));

        assert_eq!(receipt.transaction.kind, TransactionKind::Buy);
        assert_eq!(receipt.transaction.instrument_id, Some(f.acme.id));
        assert_eq!(receipt.transaction.quantity, Some(3));
        assert_eq!(receipt.transaction.description, "Buy 3 ACME @ $33.33");
        assert_eq!(f.balance().await, dec!(900.01));
    }

    #[tokio::test]
    async fn test_weighted_average_across_buys() {
        let f = fixture(dec!(5000), dec!(100)).await;

        f.ledger.buy(&f.order(10)).await.unwrap();
        f.set_price(dec!(200)).await;
        let receipt = f.ledger.buy(&f.order(10)).await.unwrap();

        let position = receipt.position.unwrap();
        assert_eq!(position.quantity, 20);
        assert_eq!(position.average_cost, dec!(150.0000));
        assert_eq!(f.balance().await, dec!(2000));
    }

    #[tokio::test]
    async fn test_buy_then_full_sell_restores_balance() {
        let f = fixture(dec!(250.75), dec!(12.34)).await;

        f.ledger.buy(&f.order(7)).await.unwrap();
        let receipt = f.ledger.sell(&f.order(7)).await.unwrap();

        assert!(receipt.position.is_none());
        assert_eq!(receipt.balance_after, dec!(250.75));
        assert_eq!(f.balance().await, dec!(250.75));

        let portfolio = f.ledger.db().get_portfolio(f.user.id).await.unwrap();
        assert!(portfolio.positions.is_empty());
    }

    #[tokio::test]
    async fn test_partial_sell_keeps_average_cost() {
        let f = fixture(dec!(1000), dec!(10)).await;

        f.ledger.buy(&f.order(10)).await.unwrap();
        f.set_price(dec!(15)).await;
        let receipt = f.ledger.sell(&f.order(4)).await.unwrap();

        assert_eq!(receipt.amount, dec!(60));
        assert_eq!(receipt.balance_after, dec!(960));
        let position = receipt.position.unwrap();
        assert_eq!(position.quantity, 6);
        assert_eq!(position.average_cost, dec!(10));
        assert_eq!(receipt.transaction.kind, TransactionKind::Sell);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let f = fixture(dec!(1000), dec!(10)).await;
        f.ledger.buy(&f.order(2)).await.unwrap();

        for quantity in [0, -3] {
            assert!(matches!(
                f.ledger.buy(&f.order(quantity)).await,
                Err(LedgerError::InvalidArgument(_))
            ));
            assert!(matches!(
                f.ledger.sell(&f.order(quantity)).await,
                Err(LedgerError::InvalidArgument(_))
            ));
        }

        assert_eq!(f.balance().await, dec!(980));
        assert_eq!(f.log().await.len(), 1);
    }

    #[tokio::test]
    async fn test_buy_without_funds_changes_nothing() {
        let f = fixture(dec!(50), dec!(10)).await;

        let err = f.ledger.buy(&f.order(6)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        assert_eq!(f.balance().await, dec!(50));
        assert!(f.log().await.is_empty());
        let portfolio = f.ledger.db().get_portfolio(f.user.id).await.unwrap();
        assert!(portfolio.positions.is_empty());
    }

    #[tokio::test]
    async fn test_sell_errors() {
        let f = fixture(dec!(100), dec!(10)).await;

        let err = f.ledger.sell(&f.order(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoSuchPosition { .. }));

        f.ledger.buy(&f.order(2)).await.unwrap();
        let err = f.ledger.sell(&f.order(3)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientHoldings { held: 2, requested: 3 }));

        assert_eq!(f.balance().await, dec!(80));
        assert_eq!(f.log().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_and_instrument() {
        let f = fixture(dec!(100), dec!(10)).await;

        let mut order = f.order(1);
        order.user_id = 404;
        assert!(matches!(f.ledger.buy(&order).await, Err(LedgerError::UserNotFound(404))));

        let mut order = f.order(1);
        order.instrument_id = 404;
        assert!(matches!(
            f.ledger.buy(&order).await,
            Err(LedgerError::InstrumentNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_zero_priced_instrument_not_tradable() {
        let f = fixture(dec!(100), dec!(0)).await;

        assert!(matches!(
            f.ledger.buy(&f.order(1)).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_sell_at_zero_price_closes_position() {
        let f = fixture(dec!(100), dec!(10)).await;
        f.ledger.buy(&f.order(1)).await.unwrap();
        f.set_price(dec!(0)).await;

        let receipt = f.ledger.sell(&f.order(1)).await.unwrap();

        assert_eq!(receipt.amount, dec!(0.00));
        assert_eq!(receipt.balance_after, dec!(90));
        assert!(receipt.position.is_none());
        assert_eq!(receipt.transaction.description, "Sell 1 ACME @ $0.00");

        let portfolio = f.ledger.db().get_portfolio(f.user.id).await.unwrap();
        assert!(portfolio.positions.is_empty());
        assert_eq!(f.log().await.len(), 2);
        assert!(f.ledger.reconcile(f.user.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_unknown_users_leave_no_locks() {
        let f = fixture(dec!(100), dec!(10)).await;
        let deposit = f.amount(dec!(5), TransactionKind::Deposit).await;
        let withdrawal = f.amount(dec!(5), TransactionKind::Withdraw).await;

        for user_id in 1000..1100 {
            let order = TradeRequest { user_id, instrument_id: f.acme.id, quantity: 1 };
            assert!(matches!(f.ledger.buy(&order).await, Err(LedgerError::UserNotFound(_))));
            assert!(matches!(f.ledger.sell(&order).await, Err(LedgerError::UserNotFound(_))));
            assert!(matches!(
                f.ledger.deposit(&CashRequest { user_id, config_id: deposit.id }).await,
                Err(LedgerError::UserNotFound(_))
            ));
            assert!(matches!(
                f.ledger.withdraw(&CashRequest { user_id, config_id: withdrawal.id }).await,
                Err(LedgerError::UserNotFound(_))
            ));
            assert!(matches!(f.ledger.reconcile(user_id).await, Err(LedgerError::UserNotFound(_))));
        }
        assert_eq!(f.ledger.locks.len(), 0);

        f.ledger.buy(&f.order(1)).await.unwrap();
        assert_eq!(f.ledger.locks.len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let f = fixture(dec!(100), dec!(10)).await;
        let deposit = f.amount(dec!(500), TransactionKind::Deposit).await;
        let withdrawal = f.amount(dec!(250.50), TransactionKind::Withdraw).await;

        let receipt = f
            .ledger
            .deposit(&CashRequest { user_id: f.user.id, config_id: deposit.id })
            .await
            .unwrap();
        assert_eq!(receipt.balance_before, dec!(100));
        assert_eq!(receipt.balance_after, dec!(600));
        assert_eq!(receipt.transaction.kind, TransactionKind::Deposit);
        assert_eq!(receipt.transaction.description, "Deposit of $500.00");

        let receipt = f
            .ledger
            .withdraw(&CashRequest { user_id: f.user.id, config_id: withdrawal.id })
            .await
            .unwrap();
        assert_eq!(receipt.amount, dec!(250.50));
        assert_eq!(receipt.balance_after, dec!(349.50));
        assert_eq!(receipt.transaction.instrument_id, None);

        // Newest first
        let log = f.log().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, TransactionKind::Withdraw);
        assert_eq!(log[1].kind, TransactionKind::Deposit);
    }

    #[tokio::test]
    async fn test_withdraw_above_balance_changes_nothing() {
        let f = fixture(dec!(100), dec!(10)).await;
        let withdrawal = f.amount(dec!(100.01), TransactionKind::Withdraw).await;

        let err = f
            .ledger
            .withdraw(&CashRequest { user_id: f.user.id, config_id: withdrawal.id })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(f.balance().await, dec!(100));
        assert!(f.log().await.is_empty());
    }

    #[tokio::test]
    async fn test_config_kind_must_match() {
        let f = fixture(dec!(100), dec!(10)).await;
        let withdrawal = f.amount(dec!(10), TransactionKind::Withdraw).await;

        let err = f
            .ledger
            .deposit(&CashRequest { user_id: f.user.id, config_id: withdrawal.id })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoSuchConfig { kind: "DEPOSIT", .. }));

        let err = f
            .ledger
            .withdraw(&CashRequest { user_id: f.user.id, config_id: 999 })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoSuchConfig { config_id: 999, .. }));
        assert_eq!(f.balance().await, dec!(100));
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back_everything() {
        let f = fixture(dec!(100), dec!(10)).await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_inserts BEFORE INSERT ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'audit log offline');
            END
            "#,
        )
        .execute(f.ledger.db().pool())
        .await
        .unwrap();

        let err = f.ledger.buy(&f.order(3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);

        assert_eq!(f.balance().await, dec!(100));
        let portfolio = f.ledger.db().get_portfolio(f.user.id).await.unwrap();
        assert!(portfolio.positions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_buys_serialize() {
        let f = fixture(dec!(100), dec!(60)).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = f.ledger.clone();
                let order = f.order(1);
                tokio::spawn(async move { ledger.buy(&order).await })
            })
            .collect();
        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::InsufficientFunds))
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(short, 1);
        assert_eq!(f.balance().await, dec!(40));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_log_reconciles_under_concurrency() {
        let f = fixture(dec!(1000), dec!(7.77)).await;
        let deposit = f.amount(dec!(25), TransactionKind::Deposit).await;
        let withdrawal = f.amount(dec!(40), TransactionKind::Withdraw).await;

        let mut handles = Vec::new();
        for i in 0..24 {
            let ledger = f.ledger.clone();
            let trade = f.order(1 + i % 3);
            let user_id = f.user.id;
            let (deposit_id, withdrawal_id) = (deposit.id, withdrawal.id);
            handles.push(tokio::spawn(async move {
                match i % 4 {
                    0 => ledger.buy(&trade).await.map(|_| ()),
                    1 => ledger.sell(&trade).await.map(|_| ()),
                    2 => ledger
                        .deposit(&CashRequest { user_id, config_id: deposit_id })
                        .await
                        .map(|_| ()),
                    _ => ledger
                        .withdraw(&CashRequest { user_id, config_id: withdrawal_id })
                        .await
                        .map(|_| ()),
                }
            }));
        }
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result.unwrap() {
                assert_ne!(e.kind(), ErrorKind::StoreFailure, "unexpected store failure: {}", e);
            }
        }

        let reconciliation = f.ledger.reconcile(f.user.id).await.unwrap();
        assert!(reconciliation.is_consistent(), "{}", reconciliation);
        assert!(reconciliation.entries > 0);
    }
}
