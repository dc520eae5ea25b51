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

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use donation_ledger::{
    AccountId, Budget, BudgetId, Campaign, CampaignId, DeadLetterLog, Donation, InMemoryLedger,
    OperationQueue, OrganizationId, QueueWorker, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const BUDGET: BudgetId = BudgetId(1);
pub const CAMPAIGN: CampaignId = CampaignId(1);
pub const SPONSOR: UserId = UserId(99);

pub fn budget(id: BudgetId, amount_per_member: Decimal) -> Budget {
    let now = Utc::now();
    Budget {
        id,
        name: format!("budget {id}"),
        amount_per_member,
        organization: OrganizationId(1),
        sponsor: SPONSOR,
        distributed: false,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        campaigns: BTreeSet::new(),
    }
}

pub fn campaign(id: CampaignId) -> Campaign {
    Campaign::new(id, format!("campaign {id}"), dec!(10000), Utc::now() + Duration::days(30))
}

/// Budget 1 at 100 per member funding campaign 1, distributed to `members`.
/// Member `n` owns account `n` when members are passed in ascending order
/// starting at 1.
pub fn ledger_with_members(members: &[u64]) -> Arc<InMemoryLedger> {
    let ledger = InMemoryLedger::new();
    ledger.insert_budget(budget(BUDGET, dec!(100))).unwrap();
    ledger.insert_campaign(campaign(CAMPAIGN)).unwrap();
    ledger.link_campaign(BUDGET, CAMPAIGN).unwrap();
    let members: Vec<UserId> = members.iter().copied().map(UserId).collect();
    ledger.distribute_budget(BUDGET, &members).unwrap();
    Arc::new(ledger)
}

pub fn donation(account: u64, amount: Decimal) -> Donation {
    Donation::new(AccountId(account), BUDGET, CAMPAIGN, UserId(account), amount).unwrap()
}

pub fn worker(ledger: &Arc<InMemoryLedger>) -> QueueWorker<Arc<InMemoryLedger>> {
    QueueWorker::new(
        Arc::new(OperationQueue::new()),
        Arc::clone(ledger),
        Arc::new(DeadLetterLog::default()),
    )
}
