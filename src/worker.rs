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

//! Single-consumer queue worker.
//!
//! The [`QueueWorker`] converges the ledger with the [`OperationQueue`]. Each
//! [`tick`](QueueWorker::tick) dequeues at most `max_operations_per_tick`
//! operations (one by default) and applies them, one at a time, through the
//! [`LedgerStore`].
//!
//! # Delivery
//!
//! At most once, best effort. A rejected operation is logged at error level
//! and recorded in the [`DeadLetterLog`]; it is never retried or requeued.
//! Ledger-level rejections (insufficient balance, closed budget window,
//! missing rows) are deterministic, so a retry would fail the same way.
//!
//! # Concurrency
//!
//! An internal busy flag makes overlapping invocations return
//! [`Tick::Busy`] without dequeuing, so no two operations from one worker are
//! ever inside the ledger procedures at the same time.

use crate::LedgerError;
use crate::base::DonationId;
use crate::config::WorkerConfig;
use crate::dead_letter::DeadLetterLog;
use crate::ledger::LedgerStore;
use crate::operation::{Operation, OperationKind};
use crate::operation_queue::OperationQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info, trace};

/// A successfully applied operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub kind: OperationKind,
    pub donation: DonationId,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Queue was empty; nothing touched.
    Idle,
    /// Another invocation is still running.
    Busy,
    Processed { applied: usize, failed: usize },
}

impl Tick {
    /// Operations attempted during the tick.
    pub fn attempted(&self) -> usize {
        match self {
            Tick::Processed { applied, failed } => applied + failed,
            Tick::Idle | Tick::Busy => 0,
        }
    }
}

/// Lifetime counters of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub applied: u64,
    pub failed: u64,
    pub idle_ticks: u64,
    pub busy_ticks: u64,
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    failed: AtomicU64,
    idle_ticks: AtomicU64,
    busy_ticks: AtomicU64,
}

/// Clears the busy flag when a tick ends, including by panic.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single consumer applying queued operations through a [`LedgerStore`].
///
/// At most one tick or drain runs at a time; an overlapping call returns
/// [`Tick::Busy`] without touching the queue.
pub struct QueueWorker<L> {
    queue: Arc<OperationQueue>,
    ledger: L,
    dead_letters: Arc<DeadLetterLog>,
    max_per_tick: usize,
    busy: AtomicBool,
    counters: Counters,
}

impl<L: LedgerStore> QueueWorker<L> {
    /// Creates a worker applying one operation per tick.
    pub fn new(queue: Arc<OperationQueue>, ledger: L, dead_letters: Arc<DeadLetterLog>) -> Self {
        Self {
            queue,
            ledger,
            dead_letters,
            max_per_tick: 1,
            busy: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn from_config(
        queue: Arc<OperationQueue>,
        ledger: L,
        dead_letters: Arc<DeadLetterLog>,
        config: &WorkerConfig,
    ) -> Self {
        Self::new(queue, ledger, dead_letters).with_max_per_tick(config.max_operations_per_tick)
    }

    /// Raises the per-tick bound. Zero is treated as one.
    pub fn with_max_per_tick(mut self, max_per_tick: usize) -> Self {
        self.max_per_tick = max_per_tick.max(1);
        self
    }

    /// Runs one scheduling tick.
    pub fn tick(&self) -> Tick {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            self.counters.busy_ticks.fetch_add(1, Ordering::Relaxed);
            debug!("previous tick still running, skipping");
            return Tick::Busy;
        };
        self.run(self.max_per_tick)
    }

    /// Processes until the queue is empty. Used at shutdown.
    ///
    /// Operations enqueued while draining are processed too.
    pub fn drain(&self) -> Tick {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            self.counters.busy_ticks.fetch_add(1, Ordering::Relaxed);
            return Tick::Busy;
        };
        self.run(usize::MAX)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            idle_ticks: self.counters.idle_ticks.load(Ordering::Relaxed),
            busy_ticks: self.counters.busy_ticks.load(Ordering::Relaxed),
        }
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterLog> {
        &self.dead_letters
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Must only be called while holding the busy guard.
    fn run(&self, limit: usize) -> Tick {
        let (mut applied, mut failed) = (0, 0);
        while applied + failed < limit {
            let Some(operation) = self.queue.dequeue() else {
                break;
            };
            match self.process(operation) {
                Ok(_) => applied += 1,
                Err(_) => failed += 1,
            }
        }

        if applied + failed == 0 {
            self.counters.idle_ticks.fetch_add(1, Ordering::Relaxed);
            trace!("donation queue empty");
            return Tick::Idle;
        }
        Tick::Processed { applied, failed }
    }

    fn process(&self, operation: Operation) -> Result<Applied, LedgerError> {
        let kind = operation.kind();
        let donation = operation.donation_id();

        match self.apply_guarded(&operation) {
            Ok(applied) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                info!(%kind, %donation, outcome = "applied", "donation operation processed");
                Ok(applied)
            }
            Err(reason) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    %kind,
                    %donation,
                    outcome = "failed",
                    %reason,
                    "donation operation processed"
                );
                self.dead_letters.record(operation, reason.clone());
                Err(reason)
            }
        }
    }

    /// A panic inside the store is reported as [`LedgerError::Storage`].
    fn apply_guarded(&self, operation: &Operation) -> Result<Applied, LedgerError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.apply(operation))).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(LedgerError::Storage(format!("ledger procedure panicked: {message}")))
        })
    }

    fn apply(&self, operation: &Operation) -> Result<Applied, LedgerError> {
        match operation {
            Operation::Create(donation) => self.ledger.apply_create(donation)?,
            Operation::Delete(donation) => self.ledger.apply_delete(donation.id)?,
        }
        Ok(Applied {
            kind: operation.kind(),
            donation: operation.donation_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{AccountId, BudgetId, CampaignId, UserId};
    use crate::donation::Donation;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    /// Records calls and answers from a script.
    #[derive(Default)]
    struct ScriptedLedger {
        calls: Mutex<Vec<(OperationKind, DonationId)>>,
        reject: Option<LedgerError>,
        panic: bool,
    }

    impl LedgerStore for ScriptedLedger {
        fn apply_create(&self, donation: &Donation) -> Result<(), LedgerError> {
            if self.panic {
                panic!("connection pool poisoned");
            }
            self.calls.lock().push((OperationKind::Create, donation.id));
            self.reject.clone().map_or(Ok(()), Err)
        }

        fn apply_delete(&self, donation: DonationId) -> Result<(), LedgerError> {
            self.calls.lock().push((OperationKind::Delete, donation));
            self.reject.clone().map_or(Ok(()), Err)
        }
    }

    fn donation() -> Donation {
        Donation::new(AccountId(1), BudgetId(1), CampaignId(1), UserId(1), dec!(10)).unwrap()
    }

    fn worker(ledger: ScriptedLedger) -> QueueWorker<ScriptedLedger> {
        QueueWorker::new(
            Arc::new(OperationQueue::new()),
            ledger,
            Arc::new(DeadLetterLog::default()),
        )
    }

    #[test]
    fn idle_tick_touches_nothing() {
        let worker = worker(ScriptedLedger::default());
        assert_eq!(worker.tick(), Tick::Idle);
        assert!(worker.ledger().calls.lock().is_empty());
        assert_eq!(worker.stats().idle_ticks, 1);
    }

    #[test]
    fn one_operation_per_tick_by_default() {
        let worker = worker(ScriptedLedger::default());
        let (a, b) = (donation(), donation());
        worker.queue().submit(OperationKind::Create, a.clone());
        worker.queue().submit(OperationKind::Delete, b.clone());

        assert_eq!(worker.tick(), Tick::Processed { applied: 1, failed: 0 });
        assert_eq!(worker.queue().len(), 1);
        assert_eq!(worker.tick(), Tick::Processed { applied: 1, failed: 0 });

        let calls = worker.ledger().calls.lock().clone();
        assert_eq!(
            calls,
            vec![(OperationKind::Create, a.id), (OperationKind::Delete, b.id)]
        );
    }

    #[test]
    fn larger_bound_takes_more_per_tick() {
        let worker = worker(ScriptedLedger::default()).with_max_per_tick(2);
        for _ in 0..3 {
            worker.queue().submit(OperationKind::Create, donation());
        }
        assert_eq!(worker.tick(), Tick::Processed { applied: 2, failed: 0 });
        assert_eq!(worker.tick(), Tick::Processed { applied: 1, failed: 0 });
        assert_eq!(worker.tick(), Tick::Idle);
    }

    #[test]
    fn rejection_goes_to_dead_letters_without_requeue() {
        let worker = worker(ScriptedLedger {
            reject: Some(LedgerError::InsufficientFunds),
            ..Default::default()
        });
        let d = donation();
        worker.queue().submit(OperationKind::Create, d.clone());

        assert_eq!(worker.tick(), Tick::Processed { applied: 0, failed: 1 });
        assert!(worker.queue().is_empty());

        let dead = worker.dead_letters().entries();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].operation, Operation::Create(d));
        assert_eq!(dead[0].reason, LedgerError::InsufficientFunds);
        assert_eq!(worker.stats().failed, 1);
    }

    #[test]
    fn panicking_store_is_reported_as_storage_failure() {
        let worker = worker(ScriptedLedger {
            panic: true,
            ..Default::default()
        });
        worker.queue().submit(OperationKind::Create, donation());

        assert_eq!(worker.tick(), Tick::Processed { applied: 0, failed: 1 });
        let dead = worker.dead_letters().entries();
        assert_eq!(
            dead[0].reason,
            LedgerError::Storage("ledger procedure panicked: connection pool poisoned".into())
        );
        // The busy flag was released.
        assert_eq!(worker.tick(), Tick::Idle);
    }

    #[test]
    fn busy_worker_skips_tick() {
        let worker = worker(ScriptedLedger::default());
        worker.queue().submit(OperationKind::Create, donation());

        let guard = BusyGuard::acquire(&worker.busy).unwrap();
        assert_eq!(worker.tick(), Tick::Busy);
        assert_eq!(worker.queue().len(), 1);
        drop(guard);

        assert_eq!(worker.tick(), Tick::Processed { applied: 1, failed: 0 });
        assert_eq!(worker.stats().busy_ticks, 1);
    }

    #[test]
    fn drain_empties_queue() {
        let worker = worker(ScriptedLedger::default());
        for _ in 0..5 {
            worker.queue().submit(OperationKind::Create, donation());
        }
        assert_eq!(worker.drain(), Tick::Processed { applied: 5, failed: 0 });
        assert!(worker.queue().is_empty());
    }
}
