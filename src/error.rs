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

//! Error types for ledger mutations and configuration.

use thiserror::Error;

/// Reasons a ledger mutation is rejected.
///
/// Every rejection leaves the account, budget and campaign rows untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Donation would exceed the account's remaining allowance
    #[error("insufficient account balance")]
    InsufficientFunds,

    /// Referenced account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// Referenced budget does not exist
    #[error("budget not found")]
    BudgetNotFound,

    /// Referenced campaign does not exist
    #[error("campaign not found")]
    CampaignNotFound,

    /// Referenced donation does not exist
    #[error("donation not found")]
    DonationNotFound,

    /// Account, budget and campaign are not linked together
    #[error("account, budget and campaign are not linked")]
    NotLinked,

    /// Contributor does not own the account being drawn on
    #[error("contributor does not own this account")]
    ContributorMismatch,

    /// Budget has not been distributed to members yet
    #[error("budget is not distributed")]
    BudgetNotDistributed,

    /// Now is outside the budget's validity window
    #[error("budget validity window is closed")]
    BudgetWindowClosed,

    /// Campaign is no longer collecting donations
    #[error("campaign is not accepting donations")]
    CampaignClosed,

    /// A donation with this ID has already been applied
    #[error("duplicate donation ID")]
    DuplicateDonation,

    /// Budget or campaign ID is already taken
    #[error("duplicate ledger row")]
    DuplicateRow,

    /// Backing store failed for a reason outside the ledger rules
    #[error("storage failure: {0}")]
    Storage(String),

    /// Stored rows disagree with the donation records
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LedgerError};

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::InvalidAmount.to_string(),
            "invalid amount (must be positive)"
        );
        assert_eq!(
            LedgerError::InsufficientFunds.to_string(),
            "insufficient account balance"
        );
        assert_eq!(LedgerError::DonationNotFound.to_string(), "donation not found");
        assert_eq!(
            LedgerError::ContributorMismatch.to_string(),
            "contributor does not own this account"
        );
        assert_eq!(
            LedgerError::BudgetWindowClosed.to_string(),
            "budget validity window is closed"
        );
        assert_eq!(LedgerError::DuplicateDonation.to_string(), "duplicate donation ID");
        assert_eq!(
            LedgerError::Storage("connection reset".into()).to_string(),
            "storage failure: connection reset"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::InsufficientFunds;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }

    #[test]
    fn config_error_names_the_key() {
        let error = ConfigError::InvalidValue {
            key: "max_operations_per_tick",
            value: "0".into(),
        };
        assert_eq!(error.to_string(), "invalid value for max_operations_per_tick: 0");
    }
}
