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

//! Campaigns and their funding totals.

use crate::LedgerError;
use crate::base::CampaignId;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    InProgress,
    Successful,
    Failed,
}

#[derive(Debug)]
pub(crate) struct CampaignData {
    status: CampaignStatus,
    total_donations: Decimal,
}

impl CampaignData {
    pub(crate) fn status(&self) -> CampaignStatus {
        self.status
    }

    pub(crate) fn total_donations(&self) -> Decimal {
        self.total_donations
    }

    pub(crate) fn set_status(&mut self, status: CampaignStatus) {
        self.status = status;
    }

    pub(crate) fn add_donation(&mut self, amount: Decimal) {
        self.total_donations += amount;
    }

    pub(crate) fn remove_donation(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if self.total_donations < amount {
            return Err(LedgerError::InvariantViolation(format!(
                "campaign total {} is below removed donation {}",
                self.total_donations, amount
            )));
        }
        self.total_donations -= amount;
        Ok(())
    }
}

/// A funding target accumulating donations until its deadline.
#[derive(Debug)]
pub struct Campaign {
    id: CampaignId,
    title: String,
    donations_required: Decimal,
    funding_deadline: DateTime<Utc>,
    inner: Mutex<CampaignData>,
}

impl Campaign {
    pub fn new(
        id: CampaignId,
        title: impl Into<String>,
        donations_required: Decimal,
        funding_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            donations_required,
            funding_deadline,
            inner: Mutex::new(CampaignData {
                status: CampaignStatus::InProgress,
                total_donations: Decimal::ZERO,
            }),
        }
    }

    pub fn id(&self) -> CampaignId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn donations_required(&self) -> Decimal {
        self.donations_required
    }

    pub fn funding_deadline(&self) -> DateTime<Utc> {
        self.funding_deadline
    }

    pub fn status(&self) -> CampaignStatus {
        self.inner.lock().status
    }

    pub fn total_donations(&self) -> Decimal {
        self.inner.lock().total_donations
    }

    /// True once donations meet the requirement.
    pub fn is_funded(&self) -> bool {
        self.total_donations() >= self.donations_required
    }

    /// Whether a donation stamped `now` may still be credited.
    pub(crate) fn accepts_at(&self, data: &CampaignData, now: DateTime<Utc>) -> bool {
        data.status == CampaignStatus::InProgress && now <= self.funding_deadline
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CampaignData> {
        self.inner.lock()
    }
}

impl Serialize for Campaign {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Campaign", 4)?;
        state.serialize_field("campaign", &self.id)?;
        state.serialize_field("status", &data.status)?;
        state.serialize_field("donations_required", &self.donations_required)?;
        state.serialize_field("total_donations", &data.total_donations)?;
        state.end()
    }
}
