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

//! Human-readable account statements.

use crate::account::AccountSnapshot;
use crate::base::{AccountNumber, Timestamp};
use crate::transaction::TransactionRecord;
use std::fmt::Write;

const TITLE: &str = "BRANCH LEDGER - ACCOUNT STATEMENT";

/// Conventional file name a statement is exported under.
pub fn file_name(number: &AccountNumber) -> String {
    format!("statement_{number}.txt")
}

/// Renders the header block followed by one line per record:
/// `timestamp | kind | amount | Balance: balanceAfter`.
pub fn render(
    account: &AccountSnapshot,
    history: &[TransactionRecord],
    generated_at: Timestamp,
) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(out, "{}\n", "=".repeat(TITLE.len()));
    let _ = writeln!(out, "Account Number: {}", account.number);
    let _ = writeln!(out, "Account Holder: {}", account.holder_name);
    let _ = writeln!(out, "Account Type: {}", account.account_type);
    let _ = writeln!(out, "Current Balance: {:.2}", account.balance);
    let _ = writeln!(out, "Statement Generated: {generated_at}\n");
    let _ = writeln!(out, "TRANSACTION HISTORY:");
    let _ = writeln!(out, "-------------------");

    if history.is_empty() {
        let _ = writeln!(out, "No transactions found.");
    }
    for record in history {
        let _ = writeln!(
            out,
            "{} | {} | {:.2} | Balance: {:.2}",
            record.timestamp, record.kind, record.amount, record.balance_after
        );
    }

    out
}
