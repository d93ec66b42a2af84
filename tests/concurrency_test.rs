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

//! Multi-threaded ledger tests using parking_lot's built-in deadlock detector.
//!
//! The ledger keeps all state behind one mutex. These tests hammer it from
//! many threads and check that nothing deadlocks and no money is created or
//! destroyed along the way.

use branch_ledger::{AccountNumber, AccountType, FileStore, Ledger, LedgerConfig, LedgerError};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

struct Detector {
    running: Arc<AtomicBool>,
    found: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Starts a background thread that checks for deadlocks.
fn start_deadlock_detector() -> Detector {
    let running = Arc::new(AtomicBool::new(true));
    let found = Arc::new(AtomicBool::new(false));
    let (running_clone, found_clone) = (running.clone(), found.clone());

    let handle = thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }
            eprintln!("\n=== DEADLOCK DETECTED ===");
            for (i, threads) in deadlocks.iter().enumerate() {
                eprintln!("\nDeadlock #{}", i + 1);
                for t in threads {
                    eprintln!("Thread ID: {:?}", t.thread_id());
                    eprintln!("Backtrace:\n{:#?}", t.backtrace());
                }
            }
            found_clone.store(true, Ordering::SeqCst);
            return;
        }
    });

    Detector {
        running,
        found,
        handle,
    }
}

/// Stops the detector and fails the test if it saw a deadlock.
fn stop_deadlock_detector(detector: Detector) {
    detector.running.store(false, Ordering::SeqCst);
    detector.handle.join().expect("detector thread panicked");
    assert!(
        !detector.found.load(Ordering::SeqCst),
        "Deadlock detected! See output above for details."
    );
}

fn open_accounts(ledger: &Ledger, count: usize, deposit: Decimal) -> Vec<AccountNumber> {
    (0..count)
        .map(|i| {
            ledger
                .create_account(&format!("Holder {i}"), "pw", AccountType::Savings, deposit)
                .unwrap()
        })
        .collect()
}

fn total_balance(ledger: &Ledger) -> Decimal {
    ledger.accounts().iter().map(|a| a.balance()).sum()
}

// === Tests ===

/// Transfers in both directions between every pair of accounts.
#[test]
fn no_deadlock_crossing_transfers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_THREADS: usize = 16;
    const NUM_ACCOUNTS: usize = 8;
    const OPS_PER_THREAD: usize = 200;

    let accounts = Arc::new(open_accounts(&ledger, NUM_ACCOUNTS, dec!(1000)));
    let total_before = total_balance(&ledger);
    let log_before = ledger.transactions().len();

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let ledger = ledger.clone();
        let accounts = accounts.clone();

        handles.push(thread::spawn(move || {
            let mut committed = 0usize;
            for i in 0..OPS_PER_THREAD {
                let from = &accounts[(thread_id + i) % NUM_ACCOUNTS];
                let to = &accounts[(thread_id * 3 + i + 1) % NUM_ACCOUNTS];
                match ledger.transfer(from, to, dec!(7.25)) {
                    Ok(_) => committed += 1,
                    Err(
                        LedgerError::SameAccount
                        | LedgerError::InsufficientFunds
                        | LedgerError::BelowMinimumBalance { .. },
                    ) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            committed
        }));
    }

    let committed: usize = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .sum();

    stop_deadlock_detector(detector);

    assert_eq!(total_balance(&ledger), total_before);
    assert_eq!(ledger.transactions().len(), log_before + committed * 2);
    for number in accounts.iter() {
        assert!(ledger.balance_of(number).unwrap() >= dec!(100));
    }
}

/// Mixed writers and readers on a single hot account.
#[test]
fn no_deadlock_high_contention_single_account() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());
    let number = Arc::new(open_accounts(&ledger, 1, dec!(500)).remove(0));

    const NUM_THREADS: usize = 32;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let ledger = ledger.clone();
        let number = number.clone();

        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                match i % 4 {
                    0 => {
                        ledger.deposit(&number, dec!(10)).unwrap();
                    }
                    1 => {
                        let _ = ledger.withdraw(&number, dec!(10));
                    }
                    2 => {
                        assert!(ledger.authenticate(&number, "pw"));
                        let _ = ledger.details_of(&number).unwrap();
                    }
                    _ => {
                        let _ = ledger.history_of(&number);
                        let _ = ledger.generate_statement(&number).unwrap();
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let balance = ledger.balance_of(&number).unwrap();
    let history = ledger.history_of(&number);
    assert!(balance >= dec!(100));
    assert_eq!(history.last().map(|r| r.balance_after), Some(balance));
}

/// Concurrent account creation never hands out the same number twice.
#[test]
fn concurrent_creation_issues_unique_numbers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new());

    const NUM_THREADS: usize = 8;
    const ACCOUNTS_PER_THREAD: usize = 50;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let ledger = ledger.clone();
            thread::spawn(move || open_accounts(&ledger, ACCOUNTS_PER_THREAD, dec!(100)))
        })
        .collect();

    let mut numbers: Vec<AccountNumber> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("Thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), NUM_THREADS * ACCOUNTS_PER_THREAD);
    assert_eq!(ledger.accounts().len(), NUM_THREADS * ACCOUNTS_PER_THREAD);
}

/// Write-through saves happen under the lock, so the files always hold a
/// state some caller observed.
#[test]
fn no_deadlock_with_write_through_store() {
    let detector = start_deadlock_detector();
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(
        Ledger::builder()
            .config(LedgerConfig::default())
            .store(FileStore::in_dir(dir.path()))
            .build()
            .unwrap(),
    );
    let accounts = Arc::new(open_accounts(&ledger, 4, dec!(1000)));

    const NUM_THREADS: usize = 4;
    const OPS_PER_THREAD: usize = 25;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let ledger = ledger.clone();
            let accounts = accounts.clone();
            thread::spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let from = &accounts[thread_id];
                    let to = &accounts[(thread_id + i + 1) % accounts.len()];
                    let _ = ledger.transfer(from, to, dec!(5));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let reopened = Ledger::builder()
        .store(FileStore::in_dir(dir.path()))
        .build()
        .unwrap();
    assert_eq!(reopened.accounts(), ledger.accounts());
    assert_eq!(reopened.transactions(), ledger.transactions());
}
