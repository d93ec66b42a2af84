// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Account management.
//!
//! Only `balance` and `active` ever change after an account is opened.
//!
//! ```text
//!  Active ──credit/debit──► Active
//!    │
//!    └──deactivate──► Inactive (terminal, balance frozen)
//! ```

use crate::base::{AccountNumber, Timestamp};
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Kind of account offered by the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccountType {
    Savings,
    Current,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Savings => f.write_str("Savings"),
            Self::Current => f.write_str("Current"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "savings" => Ok(Self::Savings),
            "current" => Ok(Self::Current),
            other => Err(format!("unknown account type {other:?}")),
        }
    }
}

/// Branch account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    number: AccountNumber,
    holder_name: String,
    password: String,
    balance: Decimal,
    account_type: AccountType,
    created_at: Timestamp,
    active: bool,
}

impl Account {
    /// Opens a new, active account.
    pub(crate) fn open(
        number: AccountNumber,
        holder_name: String,
        password: String,
        account_type: AccountType,
        balance: Decimal,
        created_at: Timestamp,
    ) -> Self {
        let account = Self {
            number,
            holder_name,
            password,
            balance,
            account_type,
            created_at,
            active: true,
        };
        account.assert_invariants();
        account
    }

    /// Rebuilds an account exactly as it was persisted.
    pub(crate) fn restore(
        number: AccountNumber,
        holder_name: String,
        password: String,
        balance: Decimal,
        account_type: AccountType,
        created_at: Timestamp,
        active: bool,
    ) -> Self {
        Self {
            number,
            holder_name,
            password,
            balance,
            account_type,
            created_at,
            active,
        }
    }

    pub fn number(&self) -> &AccountNumber {
        &self.number
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    /// The stored credential, exactly as entered. Only the codec needs it.
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Case-sensitive exact comparison.
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot::from(self)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance of {} went negative: {}",
            self.number,
            self.balance
        );
    }

    /// Increases the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if !self.active {
            return Err(LedgerError::AccountNotFound(self.number.to_string()));
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(self.balance)
    }

    /// Balance a debit of `amount` would leave, without applying it.
    pub(crate) fn check_debit(
        &self,
        amount: Decimal,
        min_balance: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if !self.active {
            return Err(LedgerError::AccountNotFound(self.number.to_string()));
        }
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds);
        }
        let remaining = self.balance - amount;
        if remaining < min_balance {
            return Err(LedgerError::BelowMinimumBalance {
                minimum: min_balance,
            });
        }
        Ok(remaining)
    }

    /// Decreases the balance, keeping at least `min_balance` behind.
    pub(crate) fn debit(
        &mut self,
        amount: Decimal,
        min_balance: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.balance = self.check_debit(amount, min_balance)?;
        self.assert_invariants();
        Ok(self.balance)
    }

    /// Irreversibly deactivates the account. The balance stays as it is.
    pub(crate) fn deactivate(&mut self) -> Result<Decimal, LedgerError> {
        if !self.active {
            return Err(LedgerError::AccountAlreadyInactive(self.number.to_string()));
        }
        self.active = false;
        Ok(self.balance)
    }
}

/// Read-only view of an account, without its credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub number: AccountNumber,
    pub holder_name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub created_at: Timestamp,
    pub active: bool,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            number: account.number.clone(),
            holder_name: account.holder_name.clone(),
            account_type: account.account_type,
            balance: account.balance,
            created_at: account.created_at,
            active: account.active,
        }
    }
}
