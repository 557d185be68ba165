//! Errors raised by ledger operations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse error taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    InsufficientFunds,
    InsufficientHoldings,
    StoreFailure,
}

/// Failure of a ledger operation.
///
/// Everything except `Store` is detected before any mutation, so the ledger
/// is untouched when one of them is returned.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("instrument {0} not found")]
    InstrumentNotFound(i64),

    #[error("user {user_id} holds no position in instrument {instrument_id}")]
    NoSuchPosition { user_id: i64, instrument_id: i64 },

    #[error("no {kind} amount configured with id {config_id}")]
    NoSuchConfig { config_id: i64, kind: &'static str },

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    #[error("insufficient holdings: held {held}, requested {requested}")]
    InsufficientHoldings { held: i64, requested: i64 },

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LedgerError::UserNotFound(_)
            | LedgerError::InstrumentNotFound(_)
            | LedgerError::NoSuchPosition { .. }
            | LedgerError::NoSuchConfig { .. } => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InsufficientHoldings { .. } => ErrorKind::InsufficientHoldings,
            LedgerError::Store(_) => ErrorKind::StoreFailure,
        }
    }

    /// Machine-readable code sent on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::UserNotFound(_) => "USER_NOT_FOUND",
            LedgerError::InstrumentNotFound(_) => "INSTRUMENT_NOT_FOUND",
            LedgerError::NoSuchPosition { .. } => "NO_SUCH_POSITION",
            LedgerError::NoSuchConfig { .. } => "NO_SUCH_CONFIG",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InsufficientHoldings { .. } => "INSUFFICIENT_HOLDINGS",
            LedgerError::Store(_) => "STORE_FAILURE",
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
