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

//! Transaction records.
//!
//! Every mutating ledger operation appends exactly one record per affected
//! account. Records are never edited or removed, so they outlive the
//! accounts they describe.

use crate::base::{AccountNumber, Timestamp};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Opening,
    Deposit,
    Withdrawal,
    TransferOut { to: AccountNumber },
    TransferIn { from: AccountNumber },
    Deactivation,
    /// Description found in a data file that matches none of the above.
    Other(String),
}

impl TransactionKind {
    const OPENING: &'static str = "Account Opening";
    const DEPOSIT: &'static str = "Deposit";
    const WITHDRAWAL: &'static str = "Withdrawal";
    const TRANSFER_OUT: &'static str = "Transfer Out to ";
    const TRANSFER_IN: &'static str = "Transfer In from ";
    const DEACTIVATION: &'static str = "Account Deactivated";

    /// Reads the textual description stored in the transactions file.
    ///
    /// Never fails: unrecognised text is kept verbatim as [`Self::Other`].
    pub fn parse(text: &str) -> Self {
        let counterparty = |prefix: &str| {
            text.strip_prefix(prefix)
                .and_then(|rest| rest.parse::<AccountNumber>().ok())
        };

        match text {
            Self::OPENING => Self::Opening,
            Self::DEPOSIT => Self::Deposit,
            Self::WITHDRAWAL => Self::Withdrawal,
            Self::DEACTIVATION => Self::Deactivation,
            _ => {
                if let Some(to) = counterparty(Self::TRANSFER_OUT) {
                    Self::TransferOut { to }
                } else if let Some(from) = counterparty(Self::TRANSFER_IN) {
                    Self::TransferIn { from }
                } else {
                    Self::Other(text.to_string())
                }
            }
        }
    }

    /// The other side of a transfer, if this is one.
    pub fn counterparty(&self) -> Option<&AccountNumber> {
        match self {
            Self::TransferOut { to } => Some(to),
            Self::TransferIn { from } => Some(from),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => f.write_str(Self::OPENING),
            Self::Deposit => f.write_str(Self::DEPOSIT),
            Self::Withdrawal => f.write_str(Self::WITHDRAWAL),
            Self::TransferOut { to } => write!(f, "{}{}", Self::TRANSFER_OUT, to),
            Self::TransferIn { from } => write!(f, "{}{}", Self::TRANSFER_IN, from),
            Self::Deactivation => f.write_str(Self::DEACTIVATION),
            Self::Other(text) => f.write_str(text),
        }
    }
}

impl Serialize for TransactionKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One immutable entry of the audit log.
///
/// Field order matches the columns of the transactions file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub account_number: AccountNumber,
    pub kind: TransactionKind,
    /// Magnitude moved; zero for deactivation.
    pub amount: Decimal,
    pub timestamp: Timestamp,
    pub balance_after: Decimal,
}

impl TransactionRecord {
    pub fn new(
        account_number: AccountNumber,
        kind: TransactionKind,
        amount: Decimal,
        balance_after: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            account_number,
            kind,
            amount,
            timestamp,
            balance_after,
        }
    }
}
