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

//! Ledger configuration.

use crate::error::LedgerError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Floor every active balance must stay at or above.
pub const DEFAULT_MIN_BALANCE: Decimal = dec!(100);

/// When the ledger writes its state to the attached store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Persist after every mutating operation, before the change becomes
    /// visible. A failed write rejects the operation.
    #[default]
    EveryMutation,
    /// Persist only when [`crate::Ledger::save`] is called. Anything since
    /// the last save is lost on a crash.
    OnShutdown,
}

/// What loading does with a line it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Log a warning and keep going.
    #[default]
    Skip,
    /// Abort the whole load with the first error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub min_balance: Decimal,
    pub flush_policy: FlushPolicy,
    pub malformed_lines: MalformedLinePolicy,
}

impl LedgerConfig {
    pub fn with_min_balance(mut self, min_balance: Decimal) -> Self {
        self.min_balance = min_balance;
        self
    }

    pub fn with_flush_policy(mut self, flush_policy: FlushPolicy) -> Self {
        self.flush_policy = flush_policy;
        self
    }

    pub fn with_malformed_lines(mut self, malformed_lines: MalformedLinePolicy) -> Self {
        self.malformed_lines = malformed_lines;
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.min_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidConfig(format!(
                "minimum balance must not be negative, got {}",
                self.min_balance
            )));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_balance: DEFAULT_MIN_BALANCE,
            flush_policy: FlushPolicy::default(),
            malformed_lines: MalformedLinePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.min_balance, dec!(100));
        assert_eq!(config.flush_policy, FlushPolicy::EveryMutation);
        assert_eq!(config.malformed_lines, MalformedLinePolicy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_minimum_is_allowed() {
        let config = LedgerConfig::default().with_min_balance(Decimal::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_minimum_is_rejected() {
        let config = LedgerConfig::default().with_min_balance(dec!(-1));
        assert!(matches!(config.validate(), Err(LedgerError::InvalidConfig(_))));
    }
}
