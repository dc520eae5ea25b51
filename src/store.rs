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

//! In-process ledger store.
//!
//! [`InMemoryLedger`] keeps accounts, budgets, campaigns and donations in
//! [`DashMap`] tables and implements the [`LedgerStore`] procedures with row
//! locks, giving the same all-or-nothing guarantees a transactional database
//! procedure would.
//!
//! # Locking
//!
//! A mutation holds the account row, then the campaign row, then the donation
//! shard, always in that order. Budget rows are read and released before any
//! row lock is taken. Shared row handles are cloned out of the tables before
//! locking, so no `DashMap` guard is held while waiting on a row.

use crate::LedgerError;
use crate::account::Account;
use crate::base::{AccountId, BudgetId, CampaignId, DonationId, UserId};
use crate::budget::{Budget, BudgetAmendment};
use crate::campaign::{Campaign, CampaignStatus};
use crate::donation::Donation;
use crate::ledger::LedgerStore;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Concurrent in-memory implementation of the ledger.
///
/// # Invariants
///
/// - `account.amount = account.initial_amount - sum(donations drawn on it)`, never negative.
/// - `campaign.total_donations = sum(donations credited to it)`.
/// - A donation ID is applied at most once.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: DashMap<AccountId, Arc<Account>>,
    /// One account per member and budget.
    owners: DashMap<(UserId, BudgetId), AccountId>,
    budgets: DashMap<BudgetId, Budget>,
    campaigns: DashMap<CampaignId, Arc<Campaign>>,
    donations: DashMap<DonationId, Donation>,
    next_account_id: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a budget. It starts undistributed unless the row says otherwise.
    pub fn insert_budget(&self, budget: Budget) -> Result<(), LedgerError> {
        match self.budgets.entry(budget.id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateRow),
            Entry::Vacant(entry) => {
                entry.insert(budget);
                Ok(())
            }
        }
    }

    pub fn insert_campaign(&self, campaign: Campaign) -> Result<(), LedgerError> {
        match self.campaigns.entry(campaign.id()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateRow),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(campaign));
                Ok(())
            }
        }
    }

    /// Allows `budget` to fund `campaign`.
    pub fn link_campaign(&self, budget: BudgetId, campaign: CampaignId) -> Result<(), LedgerError> {
        if !self.campaigns.contains_key(&campaign) {
            return Err(LedgerError::CampaignNotFound);
        }
        let mut row = self
            .budgets
            .get_mut(&budget)
            .ok_or(LedgerError::BudgetNotFound)?;
        row.campaigns.insert(campaign);
        Ok(())
    }

    /// Opens one account per member at the budget's amount per member and
    /// marks the budget distributed.
    ///
    /// Distributing again opens accounts for members who joined since; the
    /// accounts of existing members keep what they already spent.
    pub fn distribute_budget(
        &self,
        budget: BudgetId,
        members: &[UserId],
    ) -> Result<Vec<AccountId>, LedgerError> {
        let amount_per_member = self
            .budgets
            .get(&budget)
            .map(|row| row.amount_per_member)
            .ok_or(LedgerError::BudgetNotFound)?;

        let mut opened = Vec::with_capacity(members.len());
        for &member in members {
            match self.owners.entry((member, budget)) {
                Entry::Occupied(entry) => {
                    let existing = *entry.get();
                    drop(entry);
                    if let Some(account) = self.account(existing) {
                        account.lock().reset_initial(amount_per_member);
                    }
                    opened.push(existing);
                }
                Entry::Vacant(entry) => {
                    let id = AccountId(self.next_account_id.fetch_add(1, Ordering::Relaxed) + 1);
                    self.accounts.insert(
                        id,
                        Arc::new(Account::new(id, member, budget, amount_per_member)),
                    );
                    entry.insert(id);
                    opened.push(id);
                }
            }
        }

        if let Some(mut row) = self.budgets.get_mut(&budget) {
            row.distributed = true;
        }
        info!(%budget, members = members.len(), "budget distributed");
        Ok(opened)
    }

    /// Applies an amendment; see [`Budget::amend`]. Returns whether a
    /// material field changed.
    pub fn amend_budget(
        &self,
        budget: BudgetId,
        amendment: BudgetAmendment,
    ) -> Result<bool, LedgerError> {
        let mut row = self
            .budgets
            .get_mut(&budget)
            .ok_or(LedgerError::BudgetNotFound)?;
        let changed = row.amend(amendment);
        if !changed && row.distributed {
            debug!(%budget, "material changes ignored on distributed budget");
        }
        Ok(changed)
    }

    pub fn set_campaign_status(
        &self,
        campaign: CampaignId,
        status: CampaignStatus,
    ) -> Result<(), LedgerError> {
        let campaign = self.campaign(campaign).ok_or(LedgerError::CampaignNotFound)?;
        let mut row = campaign.lock();
        debug!(campaign = %campaign.id(), from = ?row.status(), to = ?status, "campaign status changed");
        row.set_status(status);
        Ok(())
    }

    pub fn account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|row| Arc::clone(&row))
    }

    /// The account `owner` holds on `budget`, if the budget reached them.
    pub fn account_for(&self, owner: UserId, budget: BudgetId) -> Option<Arc<Account>> {
        let id = *self.owners.get(&(owner, budget))?;
        self.account(id)
    }

    /// All accounts, ordered by ID.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<_> = self.accounts.iter().map(|row| Arc::clone(&row)).collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }

    pub fn budget(&self, id: BudgetId) -> Option<Budget> {
        self.budgets.get(&id).map(|row| row.clone())
    }

    pub fn campaign(&self, id: CampaignId) -> Option<Arc<Campaign>> {
        self.campaigns.get(&id).map(|row| Arc::clone(&row))
    }

    /// All campaigns, ordered by ID.
    pub fn campaigns(&self) -> Vec<Arc<Campaign>> {
        let mut campaigns: Vec<_> = self.campaigns.iter().map(|row| Arc::clone(&row)).collect();
        campaigns.sort_by_key(|campaign| campaign.id());
        campaigns
    }

    pub fn donation(&self, id: DonationId) -> Option<Donation> {
        self.donations.get(&id).map(|row| row.clone())
    }

    pub fn donations_by_account(&self, account: AccountId) -> Vec<Donation> {
        self.donations
            .iter()
            .filter(|row| row.account == account)
            .map(|row| row.clone())
            .collect()
    }

    pub fn donation_count(&self) -> usize {
        self.donations.len()
    }

    /// Recomputes every account balance and campaign total from the donation
    /// rows and compares. Only meaningful while no mutation is in flight.
    pub fn audit(&self) -> Result<(), LedgerError> {
        let mut spent: HashMap<AccountId, Decimal> = HashMap::new();
        let mut raised: HashMap<CampaignId, Decimal> = HashMap::new();
        for row in self.donations.iter() {
            *spent.entry(row.account).or_default() += row.amount;
            *raised.entry(row.campaign).or_default() += row.amount;
        }

        for account in self.accounts() {
            let data = account.lock();
            let expected = data.initial_amount()
                - spent.get(&account.id()).copied().unwrap_or_default();
            if data.amount() != expected || data.amount() < Decimal::ZERO {
                return Err(LedgerError::InvariantViolation(format!(
                    "account {} holds {} but donations imply {}",
                    account.id(),
                    data.amount(),
                    expected
                )));
            }
        }

        for campaign in self.campaigns() {
            let total = campaign.lock().total_donations();
            let expected = raised.get(&campaign.id()).copied().unwrap_or_default();
            if total != expected {
                return Err(LedgerError::InvariantViolation(format!(
                    "campaign {} totals {} but donations sum to {}",
                    campaign.id(),
                    total,
                    expected
                )));
            }
        }
        Ok(())
    }

    fn account_handle(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.account(id).ok_or(LedgerError::AccountNotFound)
    }

    fn campaign_handle(&self, id: CampaignId) -> Result<Arc<Campaign>, LedgerError> {
        self.campaign(id).ok_or(LedgerError::CampaignNotFound)
    }
}

impl LedgerStore for InMemoryLedger {
    fn apply_create(&self, donation: &Donation) -> Result<(), LedgerError> {
        if donation.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let now = Utc::now();

        {
            let budget = self
                .budgets
                .get(&donation.budget)
                .ok_or(LedgerError::BudgetNotFound)?;
            if !budget.distributed {
                return Err(LedgerError::BudgetNotDistributed);
            }
            if !budget.is_open_at(now) {
                return Err(LedgerError::BudgetWindowClosed);
            }
            if !budget.funds(donation.campaign) {
                return Err(LedgerError::NotLinked);
            }
        }

        let account = self.account_handle(donation.account)?;
        let campaign = self.campaign_handle(donation.campaign)?;
        if account.budget() != donation.budget {
            return Err(LedgerError::NotLinked);
        }
        if account.owner() != donation.contributor {
            return Err(LedgerError::ContributorMismatch);
        }

        let mut account_row = account.lock();
        let mut campaign_row = campaign.lock();
        if !campaign.accepts_at(&campaign_row, now) {
            return Err(LedgerError::CampaignClosed);
        }

        match self.donations.entry(donation.id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateDonation),
            Entry::Vacant(entry) => {
                // Debit first: it is the only step that can still fail.
                account_row.debit(donation.amount)?;
                campaign_row.add_donation(donation.amount);
                entry.insert(donation.clone());
                Ok(())
            }
        }
    }

    fn apply_delete(&self, id: DonationId) -> Result<(), LedgerError> {
        let stored = self.donation(id).ok_or(LedgerError::DonationNotFound)?;
        let account = self.account_handle(stored.account)?;
        let campaign = self.campaign_handle(stored.campaign)?;

        let mut account_row = account.lock();
        let mut campaign_row = campaign.lock();
        // The row may have been deleted, or deleted and re-created against
        // other rows, since the unlocked lookup. Only the row read above is
        // covered by the locks held here.
        if self.donations.get(&id).is_none_or(|row| *row != stored) {
            return Err(LedgerError::DonationNotFound);
        }
        if campaign_row.total_donations() < stored.amount {
            return Err(LedgerError::InvariantViolation(format!(
                "campaign {} totals less than donation {}",
                campaign.id(),
                id
            )));
        }

        let (_, removed) = self
            .donations
            .remove_if(&id, |_, row| *row == stored)
            .ok_or(LedgerError::DonationNotFound)?;
        account_row.credit(removed.amount)?;
        campaign_row.remove_donation(removed.amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::OrganizationId;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn seeded() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        ledger
            .insert_budget(Budget {
                id: BudgetId(1),
                name: "Q1".into(),
                amount_per_member: dec!(100),
                organization: OrganizationId(1),
                sponsor: UserId(99),
                distributed: false,
                start_date: now - Duration::days(1),
                end_date: now + Duration::days(30),
                campaigns: BTreeSet::new(),
            })
            .unwrap();
        ledger
            .insert_campaign(Campaign::new(
                CampaignId(1),
                "Library",
                dec!(1000),
                now + Duration::days(30),
            ))
            .unwrap();
        ledger.link_campaign(BudgetId(1), CampaignId(1)).unwrap();
        ledger
    }

    #[test]
    fn distribution_opens_one_account_per_member() {
        let ledger = seeded();
        let opened = ledger
            .distribute_budget(BudgetId(1), &[UserId(1), UserId(2)])
            .unwrap();
        assert_eq!(opened.len(), 2);
        assert!(ledger.budget(BudgetId(1)).unwrap().distributed);
        let account = ledger.account_for(UserId(2), BudgetId(1)).unwrap();
        assert_eq!(account.amount(), dec!(100));
        assert_eq!(account.owner(), UserId(2));
    }

    #[test]
    fn redistribution_reuses_existing_accounts() {
        let ledger = seeded();
        let first = ledger.distribute_budget(BudgetId(1), &[UserId(1)]).unwrap();
        let second = ledger
            .distribute_budget(BudgetId(1), &[UserId(1), UserId(3)])
            .unwrap();
        assert_eq!(first[0], second[0]);
        assert_eq!(ledger.accounts().len(), 2);
    }

    #[test]
    fn distribute_unknown_budget_fails() {
        let ledger = seeded();
        let result = ledger.distribute_budget(BudgetId(9), &[UserId(1)]);
        assert_eq!(result, Err(LedgerError::BudgetNotFound));
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let ledger = seeded();
        let budget = ledger.budget(BudgetId(1)).unwrap();
        assert_eq!(ledger.insert_budget(budget), Err(LedgerError::DuplicateRow));
        let campaign = Campaign::new(CampaignId(1), "again", dec!(1), Utc::now());
        assert_eq!(ledger.insert_campaign(campaign), Err(LedgerError::DuplicateRow));
    }

    #[test]
    fn link_requires_existing_rows() {
        let ledger = seeded();
        assert_eq!(
            ledger.link_campaign(BudgetId(1), CampaignId(5)),
            Err(LedgerError::CampaignNotFound)
        );
        assert_eq!(
            ledger.link_campaign(BudgetId(5), CampaignId(1)),
            Err(LedgerError::BudgetNotFound)
        );
    }

    #[test]
    fn amend_after_distribution_keeps_allowance() {
        let ledger = seeded();
        ledger.distribute_budget(BudgetId(1), &[UserId(1)]).unwrap();
        let changed = ledger
            .amend_budget(
                BudgetId(1),
                BudgetAmendment {
                    amount_per_member: Some(dec!(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!changed);
        assert_eq!(ledger.budget(BudgetId(1)).unwrap().amount_per_member, dec!(100));
    }

    #[test]
    fn audit_passes_on_fresh_ledger() {
        let ledger = seeded();
        ledger.distribute_budget(BudgetId(1), &[UserId(1)]).unwrap();
        assert_eq!(ledger.audit(), Ok(()));
    }
}
