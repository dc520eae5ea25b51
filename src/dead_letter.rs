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

//! Dead-letter log for rejected operations.
//!
//! Failed operations are never retried. Instead of vanishing after a log
//! line they are kept here, with the rejection reason, so operators can
//! inspect and reconcile them.

use crate::LedgerError;
use crate::operation::Operation;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// An operation the ledger rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub operation: Operation,
    pub reason: LedgerError,
    pub failed_at: DateTime<Utc>,
}

/// Bounded, oldest-evicted record of dead letters.
#[derive(Debug)]
pub struct DeadLetterLog {
    capacity: usize,
    entries: Mutex<VecDeque<DeadLetter>>,
    evicted: AtomicU64,
}

impl DeadLetterLog {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a log holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn record(&self, operation: Operation, reason: LedgerError) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            if let Some(oldest) = entries.pop_front() {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    donation = %oldest.operation.donation_id(),
                    "dead-letter log full, evicting oldest entry"
                );
            }
        }
        entries.push_back(DeadLetter {
            operation,
            reason,
            failed_at: Utc::now(),
        });
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Removes and returns every retained entry, oldest first.
    pub fn take(&self) -> Vec<DeadLetter> {
        self.entries.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries dropped because the log was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
