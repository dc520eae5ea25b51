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

//! Thread-safe FIFO of pending donation operations.
//!
//! Request handlers push from any thread; a single [`QueueWorker`](crate::QueueWorker)
//! pops. There is no deduplication and no priority: arrival order is the only
//! ordering guarantee.

use crate::donation::Donation;
use crate::operation::{Operation, OperationKind};
use crossbeam::queue::SegQueue;

/// An unbounded multi-producer operation queue.
///
/// Backed by a lock-free [`SegQueue`], so `enqueue` never blocks a producer
/// and never rejects. A push that has returned happens-before any later pop.
#[derive(Debug, Default)]
pub struct OperationQueue {
    operations: SegQueue<Operation>,
}

impl OperationQueue {
    /// Creates a new empty operation queue.
    pub fn new() -> Self {
        Self {
            operations: SegQueue::new(),
        }
    }

    /// Appends an operation to the tail.
    pub fn enqueue(&self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Removes and returns the head, or `None` when nothing is pending.
    pub fn dequeue(&self) -> Option<Operation> {
        self.operations.pop()
    }

    /// Accepts a donation request from a request handler.
    ///
    /// Always succeeds; the ledger effect is applied later by the worker, so
    /// callers cannot learn here whether it will be accepted.
    pub fn submit(&self, kind: OperationKind, donation: Donation) {
        tracing::debug!(%kind, donation = %donation.id, "donation operation queued");
        self.enqueue(Operation::new(kind, donation));
    }

    /// Number of pending operations. Only a snapshot under concurrent use.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
