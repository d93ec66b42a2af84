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

//! Property-based tests for the ledger.
//!
//! These tests verify invariants that should hold for any sequence of
//! operations, valid or not.

use branch_ledger::{
    AccountNumber, AccountNumberGenerator, AccountType, EntropySource, Ledger, LedgerConfig,
    LedgerError, SequenceSource,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Amounts from -10.00 to 2000.00 in cents, so invalid ones show up too.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-1_000i64..=200_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Opening deposits, some of them below the minimum.
fn arb_opening() -> impl Strategy<Value = Decimal> {
    (5_000i64..=300_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Op {
    Open(Decimal),
    Deposit(usize, Decimal),
    Withdraw(usize, Decimal),
    Transfer(usize, usize, Decimal),
    Deactivate(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_opening().prop_map(Op::Open),
        (0..8usize, arb_amount()).prop_map(|(i, a)| Op::Deposit(i, a)),
        (0..8usize, arb_amount()).prop_map(|(i, a)| Op::Withdraw(i, a)),
        (0..8usize, 0..8usize, arb_amount()).prop_map(|(i, j, a)| Op::Transfer(i, j, a)),
        (0..8usize).prop_map(Op::Deactivate),
    ]
}

/// Indices past the end pick a number the ledger never issued.
fn pick(opened: &[AccountNumber], i: usize) -> AccountNumber {
    opened
        .get(i)
        .cloned()
        .unwrap_or_else(|| "RC000001".parse().unwrap())
}

fn apply(ledger: &Ledger, opened: &mut Vec<AccountNumber>, op: &Op) {
    match *op {
        Op::Open(deposit) => {
            if let Ok(number) = ledger.create_account("Holder", "pw", AccountType::Savings, deposit) {
                opened.push(number);
            }
        }
        Op::Deposit(i, amount) => {
            let _ = ledger.deposit(&pick(opened, i), amount);
        }
        Op::Withdraw(i, amount) => {
            let _ = ledger.withdraw(&pick(opened, i), amount);
        }
        Op::Transfer(i, j, amount) => {
            let _ = ledger.transfer(&pick(opened, i), &pick(opened, j), amount);
        }
        Op::Deactivate(i) => {
            let _ = ledger.deactivate(&pick(opened, i));
        }
    }
}

fn total_balance(ledger: &Ledger) -> Decimal {
    ledger.accounts().iter().map(|a| a.balance()).sum()
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every active account holds at least the minimum after every operation.
    #[test]
    fn active_accounts_never_drop_below_minimum(
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let ledger = Ledger::new();
        let minimum = ledger.config().min_balance;
        let mut opened = Vec::new();

        for op in &ops {
            apply(&ledger, &mut opened, op);
            for account in ledger.accounts() {
                prop_assert!(account.balance() >= Decimal::ZERO);
                if account.is_active() {
                    prop_assert!(account.balance() >= minimum, "{:?} after {:?}", account, op);
                }
            }
        }
    }

    /// A transfer appends two records and conserves money, or changes nothing.
    #[test]
    fn transfer_is_all_or_nothing(
        ops in prop::collection::vec(arb_op(), 0..30),
        from in 0..8usize,
        to in 0..8usize,
        amount in arb_amount(),
    ) {
        let ledger = Ledger::new();
        let mut opened = Vec::new();
        for op in &ops {
            apply(&ledger, &mut opened, op);
        }

        let accounts_before = ledger.accounts();
        let records_before = ledger.transactions().len();
        let total_before = total_balance(&ledger);

        let result = apply_transfer(&ledger, &opened, from, to, amount);

        let records_after = ledger.transactions().len();
        prop_assert_eq!(total_balance(&ledger), total_before);
        match result {
            Ok(_) => prop_assert_eq!(records_after, records_before + 2),
            Err(_) => {
                prop_assert_eq!(records_after, records_before);
                prop_assert_eq!(ledger.accounts(), accounts_before);
            }
        }
    }

    /// The latest record of an active account always matches its balance.
    #[test]
    fn last_record_matches_balance(
        ops in prop::collection::vec(arb_op(), 1..40),
    ) {
        let ledger = Ledger::new();
        let mut opened = Vec::new();
        for op in &ops {
            apply(&ledger, &mut opened, op);
        }

        for account in ledger.accounts() {
            let history = ledger.history_of(account.number());
            let last = history.last().expect("every account has an opening record");
            prop_assert_eq!(last.balance_after, account.balance());
        }
    }

    /// Invalid amounts are rejected before anything else is looked at.
    #[test]
    fn non_positive_amounts_are_always_invalid(
        cents in -100_000i64..=0,
    ) {
        let ledger = Ledger::new();
        let number = ledger
            .create_account("Holder", "pw", AccountType::Current, Decimal::new(50_000, 2))
            .unwrap();
        let amount = Decimal::new(cents, 2);

        prop_assert_eq!(ledger.deposit(&number, amount), Err(LedgerError::InvalidAmount));
        prop_assert_eq!(ledger.withdraw(&number, amount), Err(LedgerError::InvalidAmount));
        prop_assert_eq!(ledger.history_of(&number).len(), 1);
    }

    /// Raising the minimum never lets a withdrawal cross it.
    #[test]
    fn withdrawals_respect_configured_minimum(
        minimum_cents in 0i64..=100_000,
        withdrawals in prop::collection::vec(1i64..=50_000, 1..20),
    ) {
        let minimum = Decimal::new(minimum_cents, 2);
        let ledger = Ledger::builder()
            .config(LedgerConfig::default().with_min_balance(minimum))
            .build()
            .unwrap();
        let number = ledger
            .create_account("Holder", "pw", AccountType::Savings, minimum + Decimal::new(100_000, 2))
            .unwrap();

        for cents in withdrawals {
            let _ = ledger.withdraw(&number, Decimal::new(cents, 2));
            prop_assert!(ledger.balance_of(&number).unwrap() >= minimum);
        }
    }
}

fn apply_transfer(
    ledger: &Ledger,
    opened: &[AccountNumber],
    from: usize,
    to: usize,
    amount: Decimal,
) -> Result<(Decimal, Decimal), LedgerError> {
    ledger.transfer(&pick(opened, from), &pick(opened, to), amount)
}

// =============================================================================
// Account Number Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Generated numbers never collide with taken ones, whatever the source yields.
    #[test]
    fn generator_never_returns_a_taken_number(
        seed in any::<u64>(),
        draws in 1..200usize,
    ) {
        let mut generator = AccountNumberGenerator::new(EntropySource::seeded(seed));
        let mut taken = HashSet::new();

        for _ in 0..draws {
            let number = generator.next(|n| taken.contains(n)).unwrap();
            prop_assert!(number.as_str().starts_with("RC"));
            prop_assert_eq!(number.as_str().len(), 8);
            prop_assert!(taken.insert(number));
        }
    }

    /// A source stuck on taken values yields the first free one it offers.
    #[test]
    fn generator_retries_past_collisions(
        repeats in 1..50usize,
    ) {
        let mut values = vec![123_456u32; repeats];
        values.push(654_321);
        let mut generator = AccountNumberGenerator::new(SequenceSource::new(values));
        let taken: AccountNumber = "RC123456".parse().unwrap();

        let number = generator.next(|n| *n == taken).unwrap();
        prop_assert_eq!(number.as_str(), "RC654321");
    }

    /// Numbers issued by a ledger stay unique across deactivations.
    #[test]
    fn ledger_numbers_are_unique(
        seed in any::<u64>(),
        accounts in 1..40usize,
        deactivate_every in 1..5usize,
    ) {
        let ledger = Ledger::builder()
            .digit_source(EntropySource::seeded(seed))
            .build()
            .unwrap();
        let mut seen = HashSet::new();

        for i in 0..accounts {
            let number = ledger
                .create_account("Holder", "pw", AccountType::Savings, Decimal::new(100, 0))
                .unwrap();
            prop_assert!(seen.insert(number.clone()));
            if i % deactivate_every == 0 {
                ledger.deactivate(&number).unwrap();
            }
        }
    }
}
