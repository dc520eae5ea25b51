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

//! Member allowance accounts.
//!
//! An account is a member's remaining spendable allowance on one budget. It
//! starts at the budget's amount per member and is drawn down by donations.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use donation_ledger::{Account, AccountId, BudgetId, UserId};
//!
//! let account = Account::new(AccountId(1), UserId(7), BudgetId(3), dec!(100.00));
//! assert_eq!(account.amount(), dec!(100.00));
//! assert_eq!(account.spent(), dec!(0));
//! ```

use crate::LedgerError;
use crate::base::{AccountId, BudgetId, UserId};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug)]
pub(crate) struct AccountData {
    amount: Decimal,
    initial_amount: Decimal,
}

impl AccountData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.amount >= Decimal::ZERO,
            "Invariant violated: account balance went negative: {}",
            self.amount
        );
    }

    pub(crate) fn amount(&self) -> Decimal {
        self.amount
    }

    pub(crate) fn initial_amount(&self) -> Decimal {
        self.initial_amount
    }

    /// Draws a donation from the balance.
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.amount < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        self.amount -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Returns a deleted donation to the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.amount += amount;
        self.assert_invariants();
        Ok(())
    }

    /// Resets the allowance ceiling on redistribution, keeping what was spent.
    pub(crate) fn reset_initial(&mut self, initial_amount: Decimal) {
        self.initial_amount = initial_amount;
    }
}

/// A member's allowance on one budget.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    owner: UserId,
    budget: BudgetId,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(id: AccountId, owner: UserId, budget: BudgetId, initial_amount: Decimal) -> Self {
        Self {
            id,
            owner,
            budget,
            inner: Mutex::new(AccountData {
                amount: initial_amount,
                initial_amount,
            }),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn budget(&self) -> BudgetId {
        self.budget
    }

    /// Current spendable balance.
    pub fn amount(&self) -> Decimal {
        self.inner.lock().amount
    }

    pub fn initial_amount(&self) -> Decimal {
        self.inner.lock().initial_amount
    }

    /// Returns `initial_amount - amount`, the sum of active donations.
    pub fn spent(&self) -> Decimal {
        let data = self.inner.lock();
        data.initial_amount - data.amount
    }

    /// Row lock held by the store for the duration of one ledger mutation.
    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 5)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("budget", &self.budget)?;
        state.serialize_field(
            "amount",
            &data.amount.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.serialize_field(
            "initial_amount",
            &data.initial_amount.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
