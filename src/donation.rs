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

//! Donation records.

use crate::LedgerError;
use crate::base::{AccountId, BudgetId, CampaignId, DonationId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One contributor's donation of budget allowance to a campaign.
///
/// The amount is drawn from `account`, which must belong to `budget` and be
/// owned by `contributor`; it is credited to `campaign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub account: AccountId,
    pub budget: BudgetId,
    pub campaign: CampaignId,
    pub contributor: UserId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    /// Builds a donation request with a fresh id, stamped now.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if `amount` is not positive.
    pub fn new(
        account: AccountId,
        budget: BudgetId,
        campaign: CampaignId,
        contributor: UserId,
        amount: Decimal,
    ) -> Result<Self, LedgerError> {
        Self::with_id(DonationId::new(), account, budget, campaign, contributor, amount)
    }

    /// Same as [`Donation::new`] with a caller-chosen id, e.g. when replaying
    /// recorded requests.
    pub fn with_id(
        id: DonationId,
        account: AccountId,
        budget: BudgetId,
        campaign: CampaignId,
        contributor: UserId,
        amount: Decimal,
    ) -> Result<Self, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(Self {
            id,
            account,
            budget,
            campaign,
            contributor,
            amount,
            created_at: Utc::now(),
        })
    }
}
