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

//! # Donation Ledger
//!
//! This library moves donation mutations off the request path and applies
//! them, one at a time, against three coupled ledgers: a member's account
//! balance, the budget it draws on, and the campaign it funds.
//!
//! ## Core Components
//!
//! - [`OperationQueue`]: Unbounded multi-producer FIFO of pending [`Operation`]s
//! - [`QueueWorker`]: Single consumer applying queued operations through a [`LedgerStore`]
//! - [`Scheduler`]: Thread invoking the worker on a fixed period
//! - [`InMemoryLedger`]: Concurrent [`LedgerStore`] with atomic create/delete procedures
//! - [`DeadLetterLog`]: Record of operations the ledger rejected
//!
//! ## Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use rust_decimal_macros::dec;
//! use donation_ledger::{
//!     Budget, BudgetId, Campaign, CampaignId, DeadLetterLog, Donation, InMemoryLedger,
//!     OperationKind, OperationQueue, OrganizationId, QueueWorker, Tick, UserId,
//! };
//!
//! let ledger = Arc::new(InMemoryLedger::new());
//! let now = Utc::now();
//! ledger.insert_campaign(Campaign::new(CampaignId(1), "Garden", dec!(500), now + Duration::days(7))).unwrap();
//! ledger.insert_budget(Budget {
//!     id: BudgetId(1),
//!     name: "Spring".into(),
//!     amount_per_member: dec!(100),
//!     organization: OrganizationId(1),
//!     sponsor: UserId(99),
//!     distributed: false,
//!     start_date: now - Duration::days(1),
//!     end_date: now + Duration::days(7),
//!     campaigns: BTreeSet::from([CampaignId(1)]),
//! }).unwrap();
//! let accounts = ledger.distribute_budget(BudgetId(1), &[UserId(1)]).unwrap();
//!
//! let queue = Arc::new(OperationQueue::new());
//! let worker = QueueWorker::new(Arc::clone(&queue), Arc::clone(&ledger), Arc::new(DeadLetterLog::default()));
//!
//! // A request handler submits and returns immediately.
//! let donation = Donation::new(accounts[0], BudgetId(1), CampaignId(1), UserId(1), dec!(60)).unwrap();
//! queue.submit(OperationKind::Create, donation);
//!
//! // Later, the scheduler ticks the worker.
//! assert_eq!(worker.tick(), Tick::Processed { applied: 1, failed: 0 });
//! assert_eq!(ledger.account(accounts[0]).unwrap().amount(), dec!(40));
//! assert_eq!(ledger.campaign(CampaignId(1)).unwrap().total_donations(), dec!(60));
//! ```
//!
//! ## Consistency
//!
//! Submission is fire-and-forget: the caller learns nothing about whether
//! the ledger accepts the operation. Rejections are logged and kept in the
//! [`DeadLetterLog`], never retried.

pub mod account;
mod base;
pub mod budget;
pub mod campaign;
pub mod config;
pub mod dead_letter;
mod donation;
pub mod error;
mod ledger;
mod operation;
mod operation_queue;
pub mod scheduler;
mod store;
pub mod worker;

pub use account::Account;
pub use base::{AccountId, BudgetId, CampaignId, DonationId, OrganizationId, UserId};
pub use budget::{Budget, BudgetAmendment};
pub use campaign::{Campaign, CampaignStatus};
pub use config::{Config, DeadLetterConfig, WorkerConfig};
pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use donation::Donation;
pub use error::{ConfigError, LedgerError};
pub use ledger::LedgerStore;
pub use operation::{Operation, OperationKind};
pub use operation_queue::OperationQueue;
pub use scheduler::{Scheduler, ShutdownPolicy, ShutdownReport};
pub use store::InMemoryLedger;
pub use worker::{Applied, QueueWorker, Tick, WorkerStats};
