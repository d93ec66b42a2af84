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

//! The ledger: sole owner of accounts and the transaction log.
//!
//! # Operations
//!
//! - **Create**: Opens an account with an initial deposit of at least the
//!   minimum balance.
//! - **Deposit / Withdraw**: Move money into or out of one active account.
//! - **Transfer**: Moves money between two active accounts, atomically.
//! - **Deactivate**: Closes an account for good. Its history stays readable.
//!
//! # Locking
//!
//! All state sits behind a single [`Mutex`]. Every operation holds it from
//! validation to commit, so a transfer is never observed half-applied.

use crate::account::{Account, AccountSnapshot, AccountType};
use crate::base::{AccountNumber, Timestamp};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::{FlushPolicy, LedgerConfig};
use crate::error::LedgerError;
use crate::id_generator::{AccountNumberGenerator, DigitSource};
use crate::statement;
use crate::store::{FileStore, Snapshot};
use crate::transaction::{TransactionKind, TransactionRecord};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    /// Accounts in creation order.
    accounts: Vec<Account>,
    /// Account number to position in `accounts`.
    index: HashMap<AccountNumber, usize>,
    /// Every number ever seen, including ones only the log still mentions.
    issued: HashSet<AccountNumber>,
    /// Append-only audit log.
    transactions: Vec<TransactionRecord>,
}

impl LedgerState {
    fn from_snapshot(snapshot: Snapshot, min_balance: Decimal) -> Self {
        let mut state = Self::default();
        for account in snapshot.accounts {
            if account.is_active() && account.balance() < min_balance {
                tracing::warn!(
                    account = %account.number(),
                    balance = %account.balance(),
                    %min_balance,
                    "loaded active account below minimum balance"
                );
            }
            state.insert(account);
        }
        for record in snapshot.transactions {
            state.append(record);
        }
        state
    }

    fn insert(&mut self, account: Account) {
        let number = account.number().clone();
        self.issued.insert(number.clone());
        self.index.insert(number, self.accounts.len());
        self.accounts.push(account);
    }

    fn append(&mut self, record: TransactionRecord) {
        if !self.issued.contains(&record.account_number) {
            self.issued.insert(record.account_number.clone());
        }
        self.transactions.push(record);
    }

    fn is_taken(&self, number: &AccountNumber) -> bool {
        self.issued.contains(number)
    }

    /// Position of the account, active or not.
    fn position(&self, number: &AccountNumber) -> Result<usize, LedgerError> {
        self.index
            .get(number)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(number.to_string()))
    }

    /// Position of the account, only if it is active.
    fn active_position(&self, number: &AccountNumber) -> Result<usize, LedgerError> {
        let position = self.position(number)?;
        if self.accounts[position].is_active() {
            Ok(position)
        } else {
            Err(LedgerError::AccountNotFound(number.to_string()))
        }
    }

    fn active(&self, number: &AccountNumber) -> Result<&Account, LedgerError> {
        self.active_position(number).map(|i| &self.accounts[i])
    }

    fn active_mut(&mut self, number: &AccountNumber) -> Result<&mut Account, LedgerError> {
        self.active_position(number).map(|i| &mut self.accounts[i])
    }

    fn history(&self, number: &AccountNumber) -> Vec<TransactionRecord> {
        self.transactions
            .iter()
            .filter(|record| &record.account_number == number)
            .cloned()
            .collect()
    }
}

struct Inner {
    state: LedgerState,
    generator: AccountNumberGenerator,
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

/// Single-branch ledger.
///
/// # Invariants
///
/// - Every active account holds at least [`LedgerConfig::min_balance`]
///   after any operation that touched it.
/// - Account numbers are unique and never reused.
/// - Transaction records are append-only and never edited.
/// - Deactivation is permanent.
pub struct Ledger {
    config: LedgerConfig,
    clock: Box<dyn Clock>,
    store: Option<FileStore>,
    inner: Mutex<Inner>,
}

impl Ledger {
    /// In-memory ledger with default settings, the system clock and an
    /// OS-seeded number generator.
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
            clock: Box::new(SystemClock),
            store: None,
            inner: Mutex::new(Inner {
                state: LedgerState::default(),
                generator: AccountNumberGenerator::default(),
            }),
        }
    }

    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&FileStore> {
        self.store.as_ref()
    }

    fn write_through_store(&self) -> Option<&FileStore> {
        match self.config.flush_policy {
            FlushPolicy::EveryMutation => self.store.as_ref(),
            FlushPolicy::OnShutdown => None,
        }
    }

    /// Runs a mutating operation under the lock.
    ///
    /// With write-through enabled the operation runs against a staged copy
    /// that only replaces the live state once it is on disk. Otherwise it
    /// runs in place, and must validate fully before touching anything.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut LedgerState, &mut AccountNumberGenerator, Timestamp) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut guard = self.inner.lock();
        let Inner { state, generator } = &mut *guard;
        let now = self.clock.now();

        let Some(store) = self.write_through_store() else {
            return op(state, generator, now);
        };

        let mut staged = state.clone();
        let output = op(&mut staged, generator, now)?;
        if let Err(err) = store.save(&staged.accounts, &staged.transactions) {
            tracing::error!(error = %err, "write-through save failed, change discarded");
            return Err(err);
        }
        *state = staged;
        Ok(output)
    }

    /// Opens a new account and records the opening deposit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmptyHolderName`] - Name is blank.
    /// - [`LedgerError::UnstorableText`] - Name or password contains `|` or a line break.
    /// - [`LedgerError::InsufficientInitialDeposit`] - Deposit below the minimum balance.
    /// - [`LedgerError::AccountNumbersExhausted`] - No free number could be drawn.
    /// - [`LedgerError::Persistence`] - Write-through save failed.
    pub fn create_account(
        &self,
        holder_name: &str,
        password: &str,
        account_type: AccountType,
        initial_deposit: Decimal,
    ) -> Result<AccountNumber, LedgerError> {
        let holder_name = holder_name.trim();
        if holder_name.is_empty() {
            return Err(LedgerError::EmptyHolderName);
        }
        codec::ensure_storable("holder name", holder_name)?;
        codec::ensure_storable("password", password)?;
        let minimum = self.config.min_balance;
        if initial_deposit < minimum {
            return Err(LedgerError::InsufficientInitialDeposit { minimum });
        }

        let number = self.mutate(|state, generator, now| {
            let number = generator.next(|candidate| state.is_taken(candidate))?;
            state.insert(Account::open(
                number.clone(),
                holder_name.to_string(),
                password.to_string(),
                account_type,
                initial_deposit,
                now,
            ));
            state.append(TransactionRecord::new(
                number.clone(),
                TransactionKind::Opening,
                initial_deposit,
                initial_deposit,
                now,
            ));
            Ok(number)
        })?;

        tracing::info!(account = %number, %account_type, "account opened");
        Ok(number)
    }

    /// True only for an active account whose password matches exactly.
    pub fn authenticate(&self, number: &AccountNumber, password: &str) -> bool {
        let inner = self.inner.lock();
        let authenticated = inner
            .state
            .active(number)
            .is_ok_and(|account| account.verify_password(password));
        if !authenticated {
            tracing::debug!(account = %number, "authentication failed");
        }
        authenticated
    }

    /// Credits `amount` and returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - No active account with this number.
    pub fn deposit(&self, number: &AccountNumber, amount: Decimal) -> Result<Decimal, LedgerError> {
        ensure_positive(amount)?;
        let balance = self.mutate(|state, _, now| {
            let balance = state.active_mut(number)?.credit(amount)?;
            state.append(TransactionRecord::new(
                number.clone(),
                TransactionKind::Deposit,
                amount,
                balance,
                now,
            ));
            Ok(balance)
        })?;

        tracing::debug!(account = %number, %amount, %balance, "deposit");
        Ok(balance)
    }

    /// Debits `amount` and returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - No active account with this number.
    /// - [`LedgerError::InsufficientFunds`] - Amount exceeds the balance.
    /// - [`LedgerError::BelowMinimumBalance`] - Would leave less than the minimum.
    pub fn withdraw(&self, number: &AccountNumber, amount: Decimal) -> Result<Decimal, LedgerError> {
        ensure_positive(amount)?;
        let minimum = self.config.min_balance;
        let balance = self.mutate(|state, _, now| {
            let balance = state.active_mut(number)?.debit(amount, minimum)?;
            state.append(TransactionRecord::new(
                number.clone(),
                TransactionKind::Withdrawal,
                amount,
                balance,
                now,
            ));
            Ok(balance)
        })?;

        tracing::debug!(account = %number, %amount, %balance, "withdrawal");
        Ok(balance)
    }

    /// Moves `amount` from one active account to another.
    ///
    /// Returns the new `(from, to)` balances. Either both sides change and
    /// both records are appended, or nothing happens.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// - [`LedgerError::SameAccount`] - `from` and `to` are equal.
    /// - [`LedgerError::AccountNotFound`] - Either side is unknown or inactive.
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::InsufficientFunds`] / [`LedgerError::BelowMinimumBalance`] -
    ///   Evaluated against the source account only.
    pub fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal), LedgerError> {
        if from == to {
            return Err(LedgerError::SameAccount);
        }
        let minimum = self.config.min_balance;

        let balances = self.mutate(|state, _, now| {
            let source = state.active_position(from)?;
            let target = state.active_position(to)?;
            ensure_positive(amount)?;

            let from_balance = state.accounts[source].debit(amount, minimum)?;
            let to_balance = state.accounts[target].credit(amount)?;

            state.append(TransactionRecord::new(
                from.clone(),
                TransactionKind::TransferOut { to: to.clone() },
                amount,
                from_balance,
                now,
            ));
            state.append(TransactionRecord::new(
                to.clone(),
                TransactionKind::TransferIn { from: from.clone() },
                amount,
                to_balance,
                now,
            ));
            Ok((from_balance, to_balance))
        })?;

        tracing::debug!(%from, %to, %amount, "transfer");
        Ok(balances)
    }

    pub fn balance_of(&self, number: &AccountNumber) -> Result<Decimal, LedgerError> {
        self.inner.lock().state.active(number).map(Account::balance)
    }

    pub fn details_of(&self, number: &AccountNumber) -> Result<AccountSnapshot, LedgerError> {
        self.inner.lock().state.active(number).map(Account::snapshot)
    }

    /// Every record ever written for `number`, oldest first.
    ///
    /// Unlike the other lookups this also covers deactivated accounts, and
    /// returns an empty list for numbers the ledger has never seen.
    pub fn history_of(&self, number: &AccountNumber) -> Vec<TransactionRecord> {
        self.inner.lock().state.history(number)
    }

    /// Permanently deactivates an account, leaving its balance in place.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Number was never opened.
    /// - [`LedgerError::AccountAlreadyInactive`] - Account is already closed.
    pub fn deactivate(&self, number: &AccountNumber) -> Result<(), LedgerError> {
        let balance = self.mutate(|state, _, now| {
            let position = state.position(number)?;
            let balance = state.accounts[position].deactivate()?;
            state.append(TransactionRecord::new(
                number.clone(),
                TransactionKind::Deactivation,
                Decimal::ZERO,
                balance,
                now,
            ));
            Ok(balance)
        })?;

        tracing::info!(account = %number, %balance, "account deactivated");
        Ok(())
    }

    /// Formats a statement for an active account. Writing it out is up to
    /// the caller, see [`statement::file_name`].
    pub fn generate_statement(&self, number: &AccountNumber) -> Result<String, LedgerError> {
        let inner = self.inner.lock();
        let account = inner.state.active(number)?.snapshot();
        let history = inner.state.history(number);
        Ok(statement::render(&account, &history, self.clock.now()))
    }

    /// Writes the full state to the attached store, if any.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(store) = &self.store else {
            tracing::debug!("no store attached, nothing to save");
            return Ok(());
        };
        let inner = self.inner.lock();
        store.save(&inner.state.accounts, &inner.state.transactions)?;
        tracing::debug!(
            accounts = inner.state.accounts.len(),
            transactions = inner.state.transactions.len(),
            "ledger saved"
        );
        Ok(())
    }

    /// All accounts, active or not, in creation order.
    pub fn accounts(&self) -> Vec<Account> {
        self.inner.lock().state.accounts.clone()
    }

    /// The whole transaction log, oldest first.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.lock().state.transactions.clone()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles a [`Ledger`] from its collaborators.
///
/// ```
/// use branch_ledger::{Ledger, LedgerConfig, FixedClock, SequenceSource, Timestamp, AccountType};
/// use rust_decimal_macros::dec;
///
/// let ledger = Ledger::builder()
///     .config(LedgerConfig::default())
///     .clock(FixedClock::new(Timestamp::from_ymd_hms(2026, 10, 19, 9, 0, 0).unwrap()))
///     .digit_source(SequenceSource::new([482_913]))
///     .build()
///     .unwrap();
///
/// let number = ledger
///     .create_account("Ada Lovelace", "s3cret", AccountType::Savings, dec!(500))
///     .unwrap();
/// assert_eq!(number.as_str(), "RC482913");
/// ```
#[derive(Default)]
pub struct LedgerBuilder {
    config: LedgerConfig,
    clock: Option<Box<dyn Clock>>,
    generator: Option<AccountNumberGenerator>,
    store: Option<FileStore>,
}

impl LedgerBuilder {
    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn digit_source(mut self, source: impl DigitSource + 'static) -> Self {
        self.generator = Some(AccountNumberGenerator::new(source));
        self
    }

    /// Backs the ledger with files; their contents are loaded by [`Self::build`].
    pub fn store(mut self, store: FileStore) -> Self {
        self.store = Some(store);
        self
    }

    /// # Errors
    ///
    /// - [`LedgerError::InvalidConfig`] - Configuration rejected.
    /// - [`LedgerError::Deserialization`] / [`LedgerError::Persistence`] -
    ///   The store could not be loaded.
    pub fn build(self) -> Result<Ledger, LedgerError> {
        self.config.validate()?;

        let snapshot = match &self.store {
            Some(store) => store.load(self.config.malformed_lines)?,
            None => Snapshot::default(),
        };
        let state = LedgerState::from_snapshot(snapshot, self.config.min_balance);

        tracing::info!(
            accounts = state.accounts.len(),
            transactions = state.transactions.len(),
            "ledger ready"
        );

        Ok(Ledger {
            config: self.config,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            store: self.store,
            inner: Mutex::new(Inner {
                state,
                generator: self.generator.unwrap_or_default(),
            }),
        })
    }
}
