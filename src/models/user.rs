//! Account holder with a cash balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger account holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Login e-mail, unique across users
    pub email: String,

    /// Opaque credential string; never leaves the store through the API
    #[serde(skip_serializing, default)]
    pub credential: String,

    pub name: Option<String>,
    pub address: Option<String>,

    /// Interbank account code used for withdrawals
    pub clabe: Option<String>,

    pub bank_account: Option<String>,

    /// Cash balance, two decimal places
    pub balance: Decimal,

    pub registered_at: DateTime<Utc>,
}

/// Mutable profile fields. Anything left as `None` is untouched.
///
/// Balance and credentials are deliberately absent: unknown fields in a
/// request body are ignored, so they cannot be changed through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub clabe: Option<String>,
    pub bank_account: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.clabe.is_none()
            && self.bank_account.is_none()
    }
}

/// Operator-supplied data for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub credential: String,
    pub name: Option<String>,
    pub opening_balance: Decimal,
}
