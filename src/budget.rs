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

//! Sponsor-funded budgets.

use crate::base::{BudgetId, CampaignId, OrganizationId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An allowance pool distributed per member of an organization.
///
/// Donations may only draw on a budget once it is distributed and while now
/// lies inside `[start_date, end_date]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub name: String,
    pub amount_per_member: Decimal,
    pub organization: OrganizationId,
    pub sponsor: UserId,
    #[serde(default)]
    pub distributed: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Campaigns this budget may fund.
    #[serde(default)]
    pub campaigns: BTreeSet<CampaignId>,
}

/// Requested changes to a budget.
///
/// Once the budget is distributed only `name` is honoured; the material
/// fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetAmendment {
    pub name: Option<String>,
    pub amount_per_member: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Budget {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    pub fn funds(&self, campaign: CampaignId) -> bool {
        self.campaigns.contains(&campaign)
    }

    /// Applies an amendment, returning whether any material field changed.
    pub fn amend(&mut self, amendment: BudgetAmendment) -> bool {
        if let Some(name) = amendment.name {
            self.name = name;
        }
        if self.distributed {
            return false;
        }

        let before = (self.amount_per_member, self.start_date, self.end_date);
        if let Some(amount) = amendment.amount_per_member {
            self.amount_per_member = amount;
        }
        if let Some(start) = amendment.start_date {
            self.start_date = start;
        }
        if let Some(end) = amendment.end_date {
            self.end_date = end;
        }
        before != (self.amount_per_member, self.start_date, self.end_date)
    }
}
