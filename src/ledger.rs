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

//! The ledger mutation contract consumed by the queue worker.

use crate::LedgerError;
use crate::base::DonationId;
use crate::donation::Donation;
use std::sync::Arc;

/// Durable storage for accounts, budgets, campaigns and donations.
///
/// Both procedures are all-or-nothing: on `Err` no row has changed. Calls
/// touching the same account or campaign must serialize, so two concurrent
/// donations against a near-exhausted account cannot both succeed.
pub trait LedgerStore: Send + Sync {
    /// Inserts the donation, debits its account and credits its campaign.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is not positive.
    /// - [`LedgerError::AccountNotFound`], [`LedgerError::BudgetNotFound`],
    ///   [`LedgerError::CampaignNotFound`] - A referenced row is missing.
    /// - [`LedgerError::NotLinked`] - Account, budget and campaign do not belong together.
    /// - [`LedgerError::ContributorMismatch`] - Contributor does not own the account.
    /// - [`LedgerError::BudgetNotDistributed`], [`LedgerError::BudgetWindowClosed`] - Budget unusable.
    /// - [`LedgerError::CampaignClosed`] - Campaign no longer collects donations.
    /// - [`LedgerError::DuplicateDonation`] - The donation ID was already applied.
    /// - [`LedgerError::InsufficientFunds`] - Amount exceeds the account balance.
    fn apply_create(&self, donation: &Donation) -> Result<(), LedgerError>;

    /// Removes the donation, credits its account and debits its campaign.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DonationNotFound`] - No such donation is stored.
    fn apply_delete(&self, donation: DonationId) -> Result<(), LedgerError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    fn apply_create(&self, donation: &Donation) -> Result<(), LedgerError> {
        (**self).apply_create(donation)
    }

    fn apply_delete(&self, donation: DonationId) -> Result<(), LedgerError> {
        (**self).apply_delete(donation)
    }
}
