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

//! # Branch Ledger
//!
//! Account and transaction ledger for a single retail branch: account
//! opening, deposits, withdrawals, transfers, statements and deactivation,
//! persisted to two pipe-delimited flat files.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Owns every account and the append-only transaction log
//! - [`Account`]: Numbered store of funds with holder, credential and type
//! - [`TransactionRecord`]: Immutable audit entry written by each operation
//! - [`FileStore`]: Loads and saves the ledger through the [`codec`]
//! - [`LedgerError`]: Every recoverable failure an operation can report
//!
//! ## Example
//!
//! ```
//! use branch_ledger::{AccountType, Ledger, LedgerError};
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new();
//!
//! let alice = ledger
//!     .create_account("Alice", "pw-a", AccountType::Savings, dec!(1000))
//!     .unwrap();
//! let bob = ledger
//!     .create_account("Bob", "pw-b", AccountType::Current, dec!(100))
//!     .unwrap();
//!
//! assert_eq!(ledger.transfer(&alice, &bob, dec!(200)), Ok((dec!(800), dec!(300))));
//! assert_eq!(
//!     ledger.withdraw(&bob, dec!(250)),
//!     Err(LedgerError::BelowMinimumBalance { minimum: dec!(100) })
//! );
//! ```
//!
//! ## Thread Safety
//!
//! All ledger state sits behind one lock, so a [`Ledger`] can be shared
//! between threads and every operation, transfers included, is atomic.

pub mod account;
mod base;
mod clock;
pub mod codec;
pub mod config;
pub mod error;
mod id_generator;
mod ledger;
pub mod statement;
pub mod store;
mod transaction;

pub use account::{Account, AccountSnapshot, AccountType};
pub use base::{AccountNumber, Timestamp};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{FlushPolicy, LedgerConfig, MalformedLinePolicy};
pub use error::LedgerError;
pub use id_generator::{AccountNumberGenerator, DigitSource, EntropySource, SequenceSource};
pub use ledger::{Ledger, LedgerBuilder};
pub use store::FileStore;
pub use transaction::{TransactionKind, TransactionRecord};
