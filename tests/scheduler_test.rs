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

//! Scheduler lifecycle tests.

mod common;

use common::{CAMPAIGN, donation, ledger_with_members, worker};
use donation_ledger::{
    AccountId, Config, DeadLetterLog, Donation, DonationId, InMemoryLedger, LedgerError,
    LedgerStore, OperationKind, OperationQueue, QueueWorker, Scheduler, ShutdownPolicy,
    ShutdownReport, Tick,
};
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const NEVER: Duration = Duration::from_secs(3600);

#[test]
fn ticks_apply_queued_operations() {
    let ledger = ledger_with_members(&[1]);
    let worker = Arc::new(worker(&ledger));
    let scheduler = Scheduler::spawn(Arc::clone(&worker), Duration::from_millis(5)).unwrap();

    worker
        .queue()
        .submit(OperationKind::Create, donation(1, dec!(60)));
    worker
        .queue()
        .submit(OperationKind::Create, donation(1, dec!(10)));

    let deadline = Instant::now() + Duration::from_secs(5);
    while worker.stats().applied < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    let report = scheduler.shutdown(ShutdownPolicy::Drain);
    assert_eq!(report, ShutdownReport::default());
    assert_eq!(ledger.account(AccountId(1)).unwrap().amount(), dec!(30));
    assert_eq!(ledger.campaign(CAMPAIGN).unwrap().total_donations(), dec!(70));
}

#[test]
fn drain_policy_applies_pending_operations() {
    let ledger = ledger_with_members(&[1]);
    let worker = Arc::new(worker(&ledger));
    let scheduler = Scheduler::spawn(Arc::clone(&worker), NEVER).unwrap();

    worker
        .queue()
        .submit(OperationKind::Create, donation(1, dec!(20)));
    worker
        .queue()
        .submit(OperationKind::Create, donation(1, dec!(500)));

    let report = scheduler.shutdown(ShutdownPolicy::Drain);
    assert_eq!(
        report,
        ShutdownReport {
            drained: 2,
            discarded: 0
        }
    );
    assert_eq!(ledger.account(AccountId(1)).unwrap().amount(), dec!(80));
    assert_eq!(worker.dead_letters().len(), 1);
}

#[test]
fn discard_policy_drops_pending_operations() {
    let ledger = ledger_with_members(&[1]);
    let worker = Arc::new(worker(&ledger));
    let scheduler = Scheduler::spawn(Arc::clone(&worker), NEVER).unwrap();

    for _ in 0..3 {
        worker
            .queue()
            .submit(OperationKind::Create, donation(1, dec!(10)));
    }

    let report = scheduler.shutdown(ShutdownPolicy::Discard);
    assert_eq!(
        report,
        ShutdownReport {
            drained: 0,
            discarded: 3
        }
    );
    assert!(worker.queue().is_empty());
    assert_eq!(ledger.account(AccountId(1)).unwrap().amount(), dec!(100));
    assert!(worker.dead_letters().is_empty());
}

#[test]
fn scheduler_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[worker]\ntick_interval_ms = 5\nmax_operations_per_tick = 4\nshutdown = \"discard\""
    )
    .unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.worker.tick_interval(), Duration::from_millis(5));

    let ledger = ledger_with_members(&[1]);
    let worker = Arc::new(
        worker(&ledger).with_max_per_tick(config.worker.max_operations_per_tick),
    );
    let scheduler = Scheduler::from_config(Arc::clone(&worker), &config.worker).unwrap();
    for _ in 0..4 {
        worker
            .queue()
            .submit(OperationKind::Create, donation(1, dec!(25)));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while !worker.queue().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    scheduler.shutdown(config.worker.shutdown);

    assert_eq!(ledger.account(AccountId(1)).unwrap().amount(), dec!(0));
    assert_eq!(worker.stats().applied, 4);
}

/// Applies creates slowly so a host tick is still running at shutdown.
struct SlowLedger {
    inner: Arc<InMemoryLedger>,
    delay: Duration,
}

impl LedgerStore for SlowLedger {
    fn apply_create(&self, donation: &Donation) -> Result<(), LedgerError> {
        thread::sleep(self.delay);
        self.inner.apply_create(donation)
    }

    fn apply_delete(&self, donation: DonationId) -> Result<(), LedgerError> {
        self.inner.apply_delete(donation)
    }
}

#[test]
fn drain_waits_for_in_flight_host_tick() {
    let ledger = ledger_with_members(&[1]);
    let worker = Arc::new(QueueWorker::new(
        Arc::new(OperationQueue::new()),
        SlowLedger {
            inner: Arc::clone(&ledger),
            delay: Duration::from_millis(150),
        },
        Arc::new(DeadLetterLog::default()),
    ));
    let scheduler = Scheduler::spawn(Arc::clone(&worker), NEVER).unwrap();
    for _ in 0..3 {
        worker
            .queue()
            .submit(OperationKind::Create, donation(1, dec!(10)));
    }

    let host = {
        let worker = Arc::clone(&worker);
        thread::spawn(move || worker.tick())
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while worker.queue().len() == 3 && Instant::now() < deadline {
        thread::yield_now();
    }
    assert_eq!(worker.queue().len(), 2);

    let report = scheduler.shutdown(ShutdownPolicy::Drain);
    assert_eq!(
        report,
        ShutdownReport {
            drained: 2,
            discarded: 0
        }
    );
    assert!(worker.queue().is_empty());
    assert!(matches!(
        host.join().expect("host tick panicked"),
        Tick::Processed { applied: 1, .. }
    ));
    assert_eq!(worker.stats().applied, 3);
    assert_eq!(ledger.account(AccountId(1)).unwrap().amount(), dec!(70));
    assert_eq!(ledger.campaign(CAMPAIGN).unwrap().total_donations(), dec!(30));
}
