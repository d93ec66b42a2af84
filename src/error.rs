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

//! Error types for ledger operations and persistence.

use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger errors.
///
/// Every variant is an ordinary, recoverable outcome. A failed operation
/// never leaves a partial mutation behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No active account carries this number
    #[error("account {0} not found")]
    AccountNotFound(String),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Withdrawal or transfer exceeds the balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Withdrawal or transfer would leave less than the minimum balance
    #[error("operation would leave less than the minimum balance of {minimum}")]
    BelowMinimumBalance { minimum: Decimal },

    /// Opening deposit is below the minimum balance
    #[error("initial deposit must be at least {minimum}")]
    InsufficientInitialDeposit { minimum: Decimal },

    /// Source and destination of a transfer are the same account
    #[error("cannot transfer to the same account")]
    SameAccount,

    /// Account was already deactivated
    #[error("account {0} is already inactive")]
    AccountAlreadyInactive(String),

    /// Holder name is empty or whitespace
    #[error("account holder name must not be empty")]
    EmptyHolderName,

    /// Field would break the line-based file format
    #[error("{field} must not contain '|' or line breaks")]
    UnstorableText { field: &'static str },

    /// Text is not of the form `RC` + six digits
    #[error("invalid account number {0:?}")]
    InvalidAccountNumber(String),

    /// The random source kept producing numbers that are already taken
    #[error("no free account number found after {attempts} attempts")]
    AccountNumbersExhausted { attempts: u32 },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted line could not be decoded
    #[error("malformed line {line}: {reason}")]
    Deserialization { line: u64, reason: String },

    /// Reading or writing a backing file failed
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },
}

impl LedgerError {
    pub(crate) fn persistence(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            reason: format!("{context}: {err}"),
        }
    }
}
