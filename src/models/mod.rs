//! Data models for users, instruments, positions, transactions and amounts.

mod amount;
mod instrument;
pub mod money;
mod position;
mod transaction;
mod user;

pub use amount::AmountConfig;
pub use instrument::Instrument;
pub use position::{Portfolio, PortfolioEntry, Position, PositionChange};
pub use transaction::{NewTransaction, Transaction, TransactionKind};
pub use user::{NewUser, ProfileUpdate, User};
