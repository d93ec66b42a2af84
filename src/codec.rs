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

//! Pipe-delimited line codec for accounts and transactions.
//!
//! # Accounts
//!
//! ```text
//! accountNumber|holderName|password|balance|accountType|createdAt|active
//! RC482913|Ada Lovelace|s3cret|500.00|Savings|Mon Oct 19 09:30:00 2026|true
//! ```
//!
//! # Transactions
//!
//! ```text
//! accountNumber|kind|amount|timestamp|balanceAfter
//! RC482913|Transfer Out to RC100200|200|Mon Oct 19 09:31:00 2026|300.00
//! ```
//!
//! There is no header row and no quoting: a line is split on every `|`
//! and `"` is an ordinary character. Blank lines are ignored. Older files wrote the
//! active flag as `1`/`0` and large amounts in scientific notation
//! (`1e+06`); both are still accepted on read.

use crate::account::{Account, AccountType};
use crate::base::{AccountNumber, Timestamp};
use crate::config::MalformedLinePolicy;
use crate::error::LedgerError;
use crate::transaction::{TransactionKind, TransactionRecord};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::str::FromStr;

const DELIMITER: u8 = b'|';
const ACCOUNT_FIELDS: usize = 7;
const TRANSACTION_FIELDS: usize = 5;

/// Raw account line as read from disk.
#[derive(Debug, Deserialize)]
struct AccountRow {
    account_number: String,
    holder_name: String,
    password: String,
    balance: String,
    account_type: String,
    created_at: String,
    active: String,
}

impl AccountRow {
    fn into_account(self) -> Result<Account, String> {
        let number = self
            .account_number
            .trim()
            .parse::<AccountNumber>()
            .map_err(|e| e.to_string())?;
        if self.holder_name.trim().is_empty() {
            return Err("empty holder name".to_string());
        }
        let balance = parse_amount(&self.balance)?;
        if balance < Decimal::ZERO {
            return Err(format!("negative balance {balance}"));
        }
        let account_type = self.account_type.parse::<AccountType>()?;
        let created_at = parse_timestamp(&self.created_at)?;
        let active = parse_flag(&self.active)?;

        Ok(Account::restore(
            number,
            self.holder_name,
            self.password,
            balance,
            account_type,
            created_at,
            active,
        ))
    }
}

/// Account line as written to disk.
#[derive(Debug, Serialize)]
struct AccountLine<'a> {
    account_number: &'a AccountNumber,
    holder_name: &'a str,
    password: &'a str,
    balance: Decimal,
    account_type: AccountType,
    created_at: Timestamp,
    active: bool,
}

impl<'a> From<&'a Account> for AccountLine<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            account_number: account.number(),
            holder_name: account.holder_name(),
            password: account.password(),
            balance: account.balance(),
            account_type: account.account_type(),
            created_at: account.created_at(),
            active: account.is_active(),
        }
    }
}

/// Raw transaction line as read from disk.
#[derive(Debug, Deserialize)]
struct TransactionRow {
    account_number: String,
    kind: String,
    amount: String,
    timestamp: String,
    balance_after: String,
}

impl TransactionRow {
    fn into_record(self) -> Result<TransactionRecord, String> {
        let account_number = self
            .account_number
            .trim()
            .parse::<AccountNumber>()
            .map_err(|e| e.to_string())?;

        Ok(TransactionRecord::new(
            account_number,
            TransactionKind::parse(&self.kind),
            parse_amount(&self.amount)?,
            parse_amount(&self.balance_after)?,
            parse_timestamp(&self.timestamp)?,
        ))
    }
}

fn parse_amount(field: &str) -> Result<Decimal, String> {
    let text = field.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| format!("invalid amount {text:?}"))
}

fn parse_timestamp(field: &str) -> Result<Timestamp, String> {
    field
        .parse::<Timestamp>()
        .map_err(|e| format!("invalid timestamp {field:?}: {e}"))
}

fn parse_flag(field: &str) -> Result<bool, String> {
    match field.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(format!("invalid active flag {other:?}")),
    }
}

/// Fails for text that a line could not hold: the delimiter, CR or LF.
pub fn ensure_storable(field: &'static str, text: &str) -> Result<(), LedgerError> {
    if text.contains(['|', '\n', '\r']) {
        return Err(LedgerError::UnstorableText { field });
    }
    Ok(())
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Streams records out of `source`, decoding each with `decode`.
///
/// Decoding failures go through `policy`; I/O failures always abort.
fn read_lines<R, T>(
    source: R,
    policy: MalformedLinePolicy,
    expected_fields: usize,
    mut decode: impl FnMut(StringRecord) -> Result<T, String>,
) -> Result<Vec<T>, LedgerError>
where
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true) // Field count is checked per line below
        .quoting(false)
        .from_reader(source);

    let mut decoded = Vec::new();
    let mut record = StringRecord::new();

    loop {
        let outcome = match rdr.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) if is_blank(&record) => continue,
            Ok(true) => {
                let line = record.position().map_or(0, |p| p.line());
                let result = if record.len() == expected_fields {
                    decode(record.clone())
                } else {
                    Err(format!(
                        "expected {expected_fields} fields, found {}",
                        record.len()
                    ))
                };
                result.map_err(|reason| LedgerError::Deserialization { line, reason })
            }
            Err(e) if e.is_io_error() => {
                return Err(LedgerError::persistence("reading records", e));
            }
            Err(e) => Err(LedgerError::Deserialization {
                line: e.position().map_or(0, |p| p.line()),
                reason: e.to_string(),
            }),
        };

        match outcome {
            Ok(value) => decoded.push(value),
            Err(err) => match policy {
                MalformedLinePolicy::Strict => return Err(err),
                MalformedLinePolicy::Skip => {
                    tracing::warn!(error = %err, "skipping malformed line");
                }
            },
        }
    }

    Ok(decoded)
}

/// Reads every account in `source`.
///
/// A repeated account number counts as a malformed line; under
/// [`MalformedLinePolicy::Skip`] the first occurrence wins.
///
/// # Errors
///
/// - [`LedgerError::Deserialization`] for the first bad line, under
///   [`MalformedLinePolicy::Strict`].
/// - [`LedgerError::Persistence`] if reading itself fails.
pub fn read_accounts<R: Read>(
    source: R,
    policy: MalformedLinePolicy,
) -> Result<Vec<Account>, LedgerError> {
    let mut seen = HashSet::new();
    read_lines(source, policy, ACCOUNT_FIELDS, |record| {
        let row: AccountRow = record.deserialize(None).map_err(|e| e.to_string())?;
        let account = row.into_account()?;
        if !seen.insert(account.number().clone()) {
            return Err(format!("duplicate account number {}", account.number()));
        }
        Ok(account)
    })
}

/// Reads every transaction record in `source`, in file order.
pub fn read_transactions<R: Read>(
    source: R,
    policy: MalformedLinePolicy,
) -> Result<Vec<TransactionRecord>, LedgerError> {
    read_lines(source, policy, TRANSACTION_FIELDS, |record| {
        let row: TransactionRow = record.deserialize(None).map_err(|e| e.to_string())?;
        row.into_record()
    })
}

fn writer<W: Write>(sink: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Never)
        .from_writer(sink)
}

/// Writes one line per account, in iteration order.
pub fn write_accounts<'a, W: Write>(
    sink: W,
    accounts: impl IntoIterator<Item = &'a Account>,
) -> Result<(), LedgerError> {
    let mut wtr = writer(sink);
    for account in accounts {
        ensure_storable("holder name", account.holder_name())?;
        ensure_storable("password", account.password())?;
        wtr.serialize(AccountLine::from(account))
            .map_err(|e| LedgerError::persistence("writing account", e))?;
    }
    wtr.flush()
        .map_err(|e| LedgerError::persistence("flushing accounts", e))
}

/// Writes one line per record, in iteration order.
pub fn write_transactions<'a, W: Write>(
    sink: W,
    records: impl IntoIterator<Item = &'a TransactionRecord>,
) -> Result<(), LedgerError> {
    let mut wtr = writer(sink);
    for record in records {
        wtr.serialize(record)
            .map_err(|e| LedgerError::persistence("writing transaction", e))?;
    }
    wtr.flush()
        .map_err(|e| LedgerError::persistence("flushing transactions", e))
}
