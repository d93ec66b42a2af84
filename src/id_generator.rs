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

//! Account number allocation.
//!
//! Numbers are drawn uniformly from `RC100000..=RC999999` and redrawn on
//! collision. There is no persisted counter: the set of known numbers is
//! the only state consulted.

use crate::base::AccountNumber;
use crate::error::LedgerError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Supplies the numeric part of candidate account numbers.
pub trait DigitSource: Send {
    /// Returns a value inside `range`.
    fn draw(&mut self, range: RangeInclusive<u32>) -> u32;
}

/// Uniform random draws from a seedable generator.
#[derive(Debug, Clone)]
pub struct EntropySource<R = StdRng> {
    rng: R,
}

impl EntropySource<StdRng> {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> EntropySource<R> {
    pub fn from_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl Default for EntropySource<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> DigitSource for EntropySource<R> {
    fn draw(&mut self, range: RangeInclusive<u32>) -> u32 {
        self.rng.gen_range(range)
    }
}

/// Scripted test double that replays fixed values, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<u32>,
    position: usize,
}

impl SequenceSource {
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        let values: Vec<u32> = values.into_iter().collect();
        assert!(!values.is_empty(), "SequenceSource needs at least one value");
        Self {
            values,
            position: 0,
        }
    }
}

impl DigitSource for SequenceSource {
    fn draw(&mut self, range: RangeInclusive<u32>) -> u32 {
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value.clamp(*range.start(), *range.end())
    }
}

/// Allocates account numbers that collide with nothing already known.
pub struct AccountNumberGenerator {
    source: Box<dyn DigitSource>,
}

impl AccountNumberGenerator {
    pub const RANGE: RangeInclusive<u32> = 100_000..=999_999;
    pub const MAX_ATTEMPTS: u32 = 10_000;

    pub fn new(source: impl DigitSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Draws until `is_taken` rejects nothing.
    ///
    /// `is_taken` must answer for every number ever issued, active or not.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNumbersExhausted`] after [`Self::MAX_ATTEMPTS`]
    /// consecutive collisions.
    pub fn next(
        &mut self,
        is_taken: impl Fn(&AccountNumber) -> bool,
    ) -> Result<AccountNumber, LedgerError> {
        for _ in 0..Self::MAX_ATTEMPTS {
            let candidate = AccountNumber::from_digits(self.source.draw(Self::RANGE));
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
            tracing::trace!(%candidate, "account number collision, redrawing");
        }
        Err(LedgerError::AccountNumbersExhausted {
            attempts: Self::MAX_ATTEMPTS,
        })
    }
}

impl Default for AccountNumberGenerator {
    fn default() -> Self {
        Self::new(EntropySource::new())
    }
}

impl std::fmt::Debug for AccountNumberGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountNumberGenerator").finish_non_exhaustive()
    }
}
