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

//! Flat-file storage for the two ledger collections.

use crate::account::Account;
use crate::codec;
use crate::config::MalformedLinePolicy;
use crate::error::LedgerError;
use crate::transaction::TransactionRecord;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

pub const ACCOUNTS_FILE: &str = "accounts.dat";
pub const TRANSACTIONS_FILE: &str = "transactions.dat";

/// Everything read back from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub accounts: Vec<Account>,
    pub transactions: Vec<TransactionRecord>,
}

/// Pair of files holding accounts and transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    accounts_path: PathBuf,
    transactions_path: PathBuf,
}

impl FileStore {
    pub fn new(accounts_path: impl Into<PathBuf>, transactions_path: impl Into<PathBuf>) -> Self {
        Self {
            accounts_path: accounts_path.into(),
            transactions_path: transactions_path.into(),
        }
    }

    /// `accounts.dat` and `transactions.dat` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(ACCOUNTS_FILE), dir.join(TRANSACTIONS_FILE))
    }

    pub fn accounts_path(&self) -> &Path {
        &self.accounts_path
    }

    pub fn transactions_path(&self) -> &Path {
        &self.transactions_path
    }

    /// Loads both files. A file that does not exist reads as empty.
    pub fn load(&self, policy: MalformedLinePolicy) -> Result<Snapshot, LedgerError> {
        let accounts = match open_if_exists(&self.accounts_path)? {
            Some(file) => codec::read_accounts(file, policy)?,
            None => Vec::new(),
        };
        let transactions = match open_if_exists(&self.transactions_path)? {
            Some(file) => codec::read_transactions(file, policy)?,
            None => Vec::new(),
        };

        tracing::debug!(
            accounts = accounts.len(),
            transactions = transactions.len(),
            path = %self.accounts_path.display(),
            "loaded ledger files"
        );

        Ok(Snapshot {
            accounts,
            transactions,
        })
    }

    /// Replaces both files with the given collections.
    ///
    /// Both files are written and synced to temporary siblings before
    /// either is renamed into place. A failure while writing leaves the
    /// previous pair untouched on disk.
    pub fn save(
        &self,
        accounts: &[Account],
        transactions: &[TransactionRecord],
    ) -> Result<(), LedgerError> {
        let accounts_tmp = stage(&self.accounts_path, |w| codec::write_accounts(w, accounts))?;
        let transactions_tmp = match stage(&self.transactions_path, |w| {
            codec::write_transactions(w, transactions)
        }) {
            Ok(tmp) => tmp,
            Err(err) => {
                let _ = fs::remove_file(&accounts_tmp);
                return Err(err);
            }
        };

        commit(&transactions_tmp, &self.transactions_path).inspect_err(|_| {
            let _ = fs::remove_file(&accounts_tmp);
        })?;
        commit(&accounts_tmp, &self.accounts_path)
    }
}

fn open_if_exists(path: &Path) -> Result<Option<impl Read>, LedgerError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LedgerError::persistence(
            format_args!("opening {}", path.display()),
            e,
        )),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `<path>.tmp` and syncs it, returning its path.
fn stage(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), LedgerError>,
) -> Result<PathBuf, LedgerError> {
    let tmp_path = tmp_path(path);

    let result = (|| {
        let file = File::create(&tmp_path).map_err(|e| {
            LedgerError::persistence(format_args!("creating {}", tmp_path.display()), e)
        })?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        let file = writer.into_inner().map_err(|e| {
            LedgerError::persistence(format_args!("writing {}", tmp_path.display()), e.error())
        })?;
        file.sync_all().map_err(|e| {
            LedgerError::persistence(format_args!("syncing {}", tmp_path.display()), e)
        })
    })();

    match result {
        Ok(()) => Ok(tmp_path),
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            Err(err)
        }
    }
}

fn commit(tmp_path: &Path, path: &Path) -> Result<(), LedgerError> {
    fs::rename(tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        LedgerError::persistence(format_args!("replacing {}", path.display()), e)
    })
}
