use serde::{Deserialize, Serialize};

use super::{normalize_currency_code, Id};

/// A bank or investment account owned by exactly one user.
///
/// Balances are integer minor units (cents, fen, ...). The trends engine only
/// reads accounts; creating and editing them belongs to the account screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub owner_id: Id,
    pub currency_code: String,
    pub balance_minor: i64,
    #[serde(default)]
    pub bank_name: String,
    pub account_name: String,
}

impl Account {
    pub fn new(
        owner_id: impl Into<Id>,
        account_name: impl Into<String>,
        currency_code: &str,
        balance_minor: i64,
    ) -> Self {
        Self {
            id: Id::new(),
            owner_id: owner_id.into(),
            currency_code: normalize_currency_code(currency_code),
            balance_minor,
            bank_name: String::new(),
            account_name: account_name.into(),
        }
    }

    pub fn with_bank(mut self, bank_name: impl Into<String>) -> Self {
        self.bank_name = bank_name.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<Id>) -> Self {
        self.id = id.into();
        self
    }
}
